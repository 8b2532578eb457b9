use serde::{Deserialize, Serialize};
use stream_state_path::MAX_PATH_LENGTH;

/// Options for a [`StateStore`](crate::StateStore).
///
/// Every field has a default, so a partial TOML table is enough:
///
/// ```
/// use stream_state::StoreOptions;
///
/// let opts = StoreOptions::from_toml_str("record_log = false").unwrap();
/// assert!(!opts.record_log);
/// assert!(opts.require_object_root);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Keep every applied operation so it can be read back with
    /// [`StateStore::log`](crate::StateStore::log).
    pub record_log: bool,
    /// Refuse a root-level `set` whose value is not a mapping.
    pub require_object_root: bool,
    /// Refuse operations whose path is deeper than this.
    pub max_path_depth: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            record_log: true,
            require_object_root: true,
            max_path_depth: MAX_PATH_LENGTH,
        }
    }
}

impl StoreOptions {
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(StoreOptions::from_toml_str("").unwrap(), StoreOptions::default());
    }

    #[test]
    fn test_full_toml() {
        let opts = StoreOptions::from_toml_str(
            "record_log = false\nrequire_object_root = false\nmax_path_depth = 8\n",
        )
        .unwrap();
        assert_eq!(
            opts,
            StoreOptions {
                record_log: false,
                require_object_root: false,
                max_path_depth: 8,
            }
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(StoreOptions::from_toml_str("max_path_depth = \"deep\"").is_err());
    }
}
