//! View configuration.
//!
//! Views are configured in code through [`CollectionViewBuilder`] or from a
//! TOML document:
//!
//! ```toml
//! page_size = 25
//! can_group = false
//! is_data_sorted = true
//! ```
//!
//! [`CollectionViewBuilder`]: super::CollectionViewBuilder

use horizon_collections_core::{Result, ViewError};
use serde::{Deserialize, Serialize};

/// Static capabilities and initial paging of a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Whether filters may be installed.
    pub can_filter: bool,
    /// Whether sort descriptions may be installed.
    pub can_sort: bool,
    /// Whether group descriptions may be installed.
    pub can_group: bool,
    /// Initial page size; zero disables paging.
    pub page_size: usize,
    /// The source is already in comparator order, so rebuilds skip sorting.
    pub is_data_sorted: bool,
    /// The source is already in group order, so grouping resumes from the
    /// last used subgroup while loading.
    pub is_data_in_group_order: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            can_filter: true,
            can_sort: true,
            can_group: true,
            page_size: 0,
            is_data_sorted: false,
            is_data_in_group_order: false,
        }
    }
}

impl ViewConfig {
    /// Parses a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ViewError::Config(e.to_string()))
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ViewError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ViewConfig::from_toml_str("page_size = 25\ncan_group = false\n").unwrap();
        assert_eq!(config.page_size, 25);
        assert!(!config.can_group);
        assert!(config.can_filter);
        assert!(!config.is_data_sorted);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(ViewConfig::from_toml_str("").unwrap(), ViewConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = ViewConfig::from_toml_str("page_size = \"lots\"").unwrap_err();
        assert!(matches!(err, ViewError::Config(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ViewConfig {
            page_size: 10,
            is_data_in_group_order: true,
            ..ViewConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(ViewConfig::from_toml_str(&text).unwrap(), config);
    }
}
