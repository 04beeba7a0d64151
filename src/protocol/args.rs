//! Command arguments
//!
//! Field values of a command, keyed by field name.

use std::collections::BTreeMap;

use bytes::Bytes;

/// Field values of a single command, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: BTreeMap<String, Bytes>,
}

impl Arguments {
    /// Create an empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Bytes>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.values.get(name)
    }

    /// Get a field value, empty when the field is absent
    pub fn get_or_empty(&self, name: &str) -> Bytes {
        self.values.get(name).cloned().unwrap_or_default()
    }

    /// Get a field value as lossy UTF-8 text
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    /// Check whether a field is present
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Field names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Arguments
where
    K: Into<String>,
    V: Into<Bytes>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Arguments::new();
        for (name, value) in iter {
            args.insert(name, value);
        }
        args
    }
}
