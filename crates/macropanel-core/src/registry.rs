//! Per-run registry of named series tables.
//!
//! Built once by the load stage and consumed once by the merge stage. A key
//! maps either to a table or to an explicit absent marker carrying the
//! reason, so the run summary can say what was skipped and why.

use polars::prelude::DataFrame;
use std::collections::BTreeMap;

/// State of one registry entry.
#[derive(Debug, Clone)]
pub enum SeriesEntry {
    /// Table loaded (and resampled, where the role requires it)
    Loaded(DataFrame),
    /// Source signalled unavailability
    Absent {
        /// Human-readable reason
        reason: String,
    },
}

/// Mapping from series key to table or absent marker.
#[derive(Debug, Clone, Default)]
pub struct SeriesRegistry {
    entries: BTreeMap<String, SeriesEntry>,
}

impl SeriesRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a loaded table.
    pub fn insert(&mut self, key: &str, table: DataFrame) {
        self.entries.insert(key.to_string(), SeriesEntry::Loaded(table));
    }

    /// Record that a series could not be loaded.
    pub fn mark_absent(&mut self, key: &str, reason: impl Into<String>) {
        self.entries.insert(
            key.to_string(),
            SeriesEntry::Absent {
                reason: reason.into(),
            },
        );
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: &str, table: DataFrame) -> Self {
        self.insert(key, table);
        self
    }

    /// Table for `key`, if loaded.
    ///
    /// Keys never registered are treated the same as absent ones.
    pub fn get(&self, key: &str) -> Option<&DataFrame> {
        match self.entries.get(key) {
            Some(SeriesEntry::Loaded(table)) => Some(table),
            _ => None,
        }
    }

    /// Whether `key` has a loaded table.
    pub fn is_loaded(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Entry for `key`, if registered.
    pub fn entry(&self, key: &str) -> Option<&SeriesEntry> {
        self.entries.get(key)
    }

    /// Keys with loaded tables, in key order.
    pub fn loaded_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, SeriesEntry::Loaded(_)))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Absent keys with their reasons, in key order.
    pub fn absent(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, e)| match e {
                SeriesEntry::Absent { reason } => Some((k.as_str(), reason.as_str())),
                SeriesEntry::Loaded(_) => None,
            })
            .collect()
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_loaded_and_absent_entries() {
        let mut registry = SeriesRegistry::new();
        registry.insert("sp500", df!("date" => &[1i32], "sp500" => &[1.0]).unwrap());
        registry.mark_absent("vix", "file not found");

        assert!(registry.is_loaded("sp500"));
        assert!(!registry.is_loaded("vix"));
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.loaded_keys(), vec!["sp500"]);
        assert_eq!(registry.absent(), vec![("vix", "file not found")]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_later_entry_replaces_earlier() {
        let mut registry = SeriesRegistry::new();
        registry.mark_absent("vix", "timeout");
        registry.insert("vix", df!("date" => &[1i32]).unwrap());
        assert!(registry.is_loaded("vix"));
        assert!(registry.absent().is_empty());
    }
}
