//! # Ordered namespace list.
//!
//! [`Namespaces::resolve`] maps a raw store key to a variable name by
//! stripping the **first** configured namespace that prefixes it (list
//! order, not longest match), then one leading `/`.
//!
//! ```text
//! namespaces = ["/app", "/app/prod"]
//! "/app/prod/PORT" ─► "prod/PORT"     (first match wins)
//! "/other/PORT"    ─► "other/PORT"    (no match: separator only)
//! ```

use std::sync::Arc;

/// Ordered, cheaply cloneable list of namespaces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Namespaces(Arc<[String]>);

impl Namespaces {
    /// Creates the list, preserving order.
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(namespaces.into_iter().map(Into::into).collect())
    }

    /// Iterates namespaces in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolves a raw key to its variable name. Never fails.
    pub fn resolve(&self, key: &str) -> String {
        let stripped = self
            .iter()
            .find_map(|ns| key.strip_prefix(ns))
            .unwrap_or(key);
        stripped.strip_prefix('/').unwrap_or(stripped).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_namespace_and_separator() {
        let ns = Namespaces::new(["/app"]);
        assert_eq!(ns.resolve("/app/PORT"), "PORT");
    }

    #[test]
    fn test_first_match_not_longest() {
        let ns = Namespaces::new(["/app", "/app/prod"]);
        assert_eq!(ns.resolve("/app/prod/PORT"), "prod/PORT");

        let ns = Namespaces::new(["/app/prod", "/app"]);
        assert_eq!(ns.resolve("/app/prod/PORT"), "PORT");
    }

    #[test]
    fn test_unmatched_key_only_loses_separator() {
        let ns = Namespaces::new(["/app"]);
        assert_eq!(ns.resolve("/other/PORT"), "other/PORT");
        assert_eq!(ns.resolve("PORT"), "PORT");
    }

    #[test]
    fn test_resolved_names_carry_no_prefix() {
        let ns = Namespaces::new(["/a", "/b"]);
        for key in ["/a/X", "/b/Y", "/a/Z"] {
            let name = ns.resolve(key);
            assert!(!name.starts_with('/'), "{name}");
            assert!(!name.starts_with("a/") && !name.starts_with("b/"), "{name}");
        }
    }

    #[test]
    fn test_namespace_with_trailing_slash() {
        let ns = Namespaces::new(["/app/"]);
        assert_eq!(ns.resolve("/app/PORT"), "PORT");
    }
}
