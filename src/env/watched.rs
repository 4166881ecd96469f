//! # Restart decision for key changes.

use std::collections::HashSet;

use crate::env::Env;

/// Allow-list of variable names whose changes restart the child.
///
/// An empty list means every change qualifies.
#[derive(Clone, Debug, Default)]
pub struct WatchedKeys(HashSet<String>);

impl WatchedKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether setting `name` to `value` should restart the child.
    ///
    /// A change that leaves `current` untouched never qualifies, whatever the
    /// allow-list says.
    ///
    /// # Example
    /// ```
    /// use etcdenv::{Env, WatchedKeys};
    ///
    /// let mut current = Env::new();
    /// current.insert("FOO".into(), "bar".into());
    ///
    /// let watched = WatchedKeys::new(["FOO"]);
    /// assert!(!watched.should_restart(&current, "FOO", "bar"));
    /// assert!(watched.should_restart(&current, "FOO", "baz"));
    /// assert!(!watched.should_restart(&current, "BAR", "1"));
    /// ```
    pub fn should_restart(&self, current: &Env, name: &str, value: &str) -> bool {
        if current.get(name).is_some_and(|v| v == value) {
            return false;
        }
        self.0.is_empty() || self.0.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Env {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_noop_change_never_restarts() {
        let current = env(&[("FOO", "bar")]);
        assert!(!WatchedKeys::default().should_restart(&current, "FOO", "bar"));
        assert!(!WatchedKeys::new(["FOO"]).should_restart(&current, "FOO", "bar"));
    }

    #[test]
    fn test_empty_allow_list_accepts_everything() {
        let current = env(&[("FOO", "bar")]);
        let watched = WatchedKeys::default();
        assert!(watched.should_restart(&current, "FOO", "baz"));
        assert!(watched.should_restart(&current, "NEW", "1"));
    }

    #[test]
    fn test_allow_list_filters_names() {
        let current = env(&[("FOO", "bar"), ("BAR", "x")]);
        let watched = WatchedKeys::new(["FOO"]);
        assert!(!watched.should_restart(&current, "BAR", "y"));
        assert!(watched.should_restart(&current, "FOO", "qux"));
    }

    #[test]
    fn test_deleted_key_reports_empty_value() {
        let current = env(&[("FOO", "bar")]);
        assert!(WatchedKeys::default().should_restart(&current, "FOO", ""));
    }
}
