//! Generic publish/subscribe event bus.
//!
//! Dispatch is keyed by event name string and supports both durable
//! listeners (fire every time) and one-shot listeners (fire exactly once),
//! plus a [`EventBus::wait_for_next`] convenience built on the one-shot
//! table. The bus knows nothing about conversation semantics; the session
//! layer picks the channel names (`server.<type>`, `server.*`, ...).
//!
//! Listeners are modeled uniformly as async callbacks. A dispatch awaits
//! each listener in sequence, in registration order; ordering correctness
//! across listeners matters more than throughput here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::{ColloquyError, Result};

/// Future returned by a listener invocation.
pub type ListenerFuture = BoxFuture<'static, Result<()>>;

/// A registered callback. May suspend; the bus awaits it to completion
/// before invoking the next listener in the batch.
pub type Listener<E> = Arc<dyn Fn(E) -> ListenerFuture + Send + Sync>;

/// Identity handle for a registered listener, used for targeted removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration<E> {
    id: ListenerId,
    callback: Listener<E>,
}

struct BusTables<E> {
    durable: HashMap<String, Vec<Registration<E>>>,
    one_shot: HashMap<String, Vec<Registration<E>>>,
    next_id: u64,
}

impl<E> BusTables<E> {
    fn new() -> Self {
        Self {
            durable: HashMap::new(),
            one_shot: HashMap::new(),
            next_id: 0,
        }
    }

    fn register(
        table: &mut HashMap<String, Vec<Registration<E>>>,
        next_id: &mut u64,
        name: String,
        callback: Listener<E>,
    ) -> ListenerId {
        let id = ListenerId(*next_id);
        *next_id += 1;
        table
            .entry(name)
            .or_default()
            .push(Registration { id, callback });
        id
    }

    fn remove(
        table: &mut HashMap<String, Vec<Registration<E>>>,
        name: &str,
        id: Option<ListenerId>,
    ) -> Result<()> {
        let registrations = table
            .get_mut(name)
            .filter(|registrations| !registrations.is_empty())
            .ok_or_else(|| ColloquyError::NoListeners(name.to_string()))?;
        match id {
            Some(id) => registrations.retain(|registration| registration.id != id),
            None => registrations.clear(),
        }
        Ok(())
    }
}

/// Publish/subscribe dispatcher keyed by event name.
pub struct EventBus<E> {
    tables: Arc<Mutex<BusTables<E>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
        }
    }
}

impl<E> Default for EventBus<E>
where
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E>
where
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(BusTables::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusTables<E>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a durable listener for `name`.
    ///
    /// Returns the listener's id for later removal with [`EventBus::off`].
    pub fn on<F>(&self, name: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(E) -> ListenerFuture + Send + Sync + 'static,
    {
        let mut tables = self.lock();
        let BusTables {
            durable, next_id, ..
        } = &mut *tables;
        BusTables::register(durable, next_id, name.into(), Arc::new(callback))
    }

    /// Register a listener consumed after its first invocation.
    pub fn on_next<F>(&self, name: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(E) -> ListenerFuture + Send + Sync + 'static,
    {
        let mut tables = self.lock();
        let BusTables {
            one_shot, next_id, ..
        } = &mut *tables;
        BusTables::register(one_shot, next_id, name.into(), Arc::new(callback))
    }

    /// Remove one durable listener by id, or all durable listeners for
    /// `name` when `id` is `None`.
    ///
    /// Fails with [`ColloquyError::NoListeners`] when `name` has no durable
    /// listeners registered, including when removing "all" on an empty set.
    pub fn off(&self, name: &str, id: Option<ListenerId>) -> Result<()> {
        BusTables::remove(&mut self.lock().durable, name, id)
    }

    /// Mirror of [`EventBus::off`] for the one-shot table.
    pub fn off_next(&self, name: &str, id: Option<ListenerId>) -> Result<()> {
        BusTables::remove(&mut self.lock().one_shot, name, id)
    }

    /// Suspend until the next dispatch of `name`, up to `timeout`
    /// (`None` waits indefinitely).
    ///
    /// Returns the dispatched payload, or `None` on timeout. A timed-out
    /// wait leaves only an inert slot behind: the next dispatch of `name`
    /// consumes it without effect and without error.
    pub async fn wait_for_next(&self, name: &str, timeout: Option<Duration>) -> Option<E> {
        let (resolve_tx, resolve_rx) = oneshot::channel();
        let slot = Mutex::new(Some(resolve_tx));
        self.on_next(name, move |event| {
            if let Some(resolve_tx) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                // The receiver is gone once the wait times out; a failed
                // send is the abandoned-wait case and is not an error.
                let _ = resolve_tx.send(event);
            }
            Box::pin(futures::future::ready(Ok(())))
        });
        match timeout {
            Some(duration) => tokio::time::timeout(duration, resolve_rx).await.ok()?.ok(),
            None => resolve_rx.await.ok(),
        }
    }

    /// Invoke every listener for `name`: durable listeners first, then
    /// one-shot listeners, each table in registration order, sequentially.
    ///
    /// The one-shot table for `name` is drained before invocation, so
    /// one-shot listeners registered while this dispatch runs fire on the
    /// next dispatch only. A listener error aborts the remainder of the
    /// batch and propagates to the caller.
    pub async fn dispatch(&self, name: &str, event: E) -> Result<bool> {
        let (durable, one_shot) = {
            let mut tables = self.lock();
            let durable: Vec<Listener<E>> = tables
                .durable
                .get(name)
                .map(|registrations| {
                    registrations
                        .iter()
                        .map(|registration| Arc::clone(&registration.callback))
                        .collect()
                })
                .unwrap_or_default();
            let one_shot: Vec<Listener<E>> = tables
                .one_shot
                .remove(name)
                .map(|registrations| {
                    registrations
                        .into_iter()
                        .map(|registration| registration.callback)
                        .collect()
                })
                .unwrap_or_default();
            (durable, one_shot)
        };

        for callback in durable.iter().chain(one_shot.iter()) {
            callback(event.clone()).await?;
        }
        Ok(true)
    }

    /// Drop every listener in both tables.
    pub fn clear(&self) {
        let mut tables = self.lock();
        tables.durable.clear();
        tables.one_shot.clear();
    }
}
