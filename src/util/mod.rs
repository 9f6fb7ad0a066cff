//! Small helpers shared across the crate.

use uuid::Uuid;

/// Generate a wire identifier: `prefix` followed by random alphanumeric
/// characters, `length` characters in total.
pub fn generate_id(prefix: &str, length: usize) -> String {
    let mut id = String::from(prefix);
    while id.len() < length {
        let fill = Uuid::new_v4().simple().to_string();
        let needed = length - id.len();
        id.push_str(&fill[..needed.min(fill.len())]);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_prefix_and_total_length() {
        let id = generate_id("evt_", 21);
        assert!(id.starts_with("evt_"));
        assert_eq!(id.len(), 21);
    }

    #[test]
    fn long_prefix_is_preserved() {
        let id = generate_id("averylongprefix_", 8);
        assert!(id.starts_with("averylongprefix_"));
    }

    #[test]
    fn ids_are_unique_enough() {
        let first = generate_id("evt_", 21);
        let second = generate_id("evt_", 21);
        assert_ne!(first, second);
    }
}
