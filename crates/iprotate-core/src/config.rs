//! Instance configuration for the rotation service
//!
//! The configuration file is a JSON document listing every instance the
//! service may rotate:
//!
//! ```json
//! {
//!   "instances": [
//!     { "name": "proxy-1", "instance_name": "Ubuntu-1", "static_ip_name": "StaticIp-1" }
//!   ]
//! }
//! ```
//!
//! It is loaded once at startup and never mutated afterwards.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// A single rotatable instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Logical name used by callers (lookup key)
    pub name: String,

    /// Provider-side instance identifier
    pub instance_name: String,

    /// Provider-side static IP resource name
    pub static_ip_name: String,
}

impl InstanceConfig {
    /// Create a new instance record
    pub fn new(
        name: impl Into<String>,
        instance_name: impl Into<String>,
        static_ip_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instance_name: instance_name.into(),
            static_ip_name: static_ip_name.into(),
        }
    }
}

/// On-disk document shape
#[derive(Debug, Deserialize)]
struct ConfigFile {
    instances: Vec<InstanceConfig>,
}

/// Read-only, ordered table of instance records
///
/// Lookup is first-match: duplicate logical names are tolerated (with a
/// warning at load time) and the earliest record wins.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    instances: Vec<InstanceConfig>,
}

impl ConfigStore {
    /// Create a store from already-built records
    pub fn new(instances: Vec<InstanceConfig>) -> Self {
        Self { instances }
    }

    /// Load and validate the configuration file at `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read config file: {}", e)))?;

        Self::from_json(&data)
    }

    /// Parse and validate a configuration document
    pub fn from_json(data: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(data)
            .map_err(|e| Error::config(format!("failed to parse config file: {}", e)))?;

        let store = Self::new(file.instances);
        store.validate()?;
        Ok(store)
    }

    /// Validate the records
    ///
    /// Empty fields are rejected. Duplicate logical names are only logged.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for (index, instance) in self.instances.iter().enumerate() {
            if instance.name.trim().is_empty() {
                return Err(Error::config(format!(
                    "instances[{}]: name cannot be empty",
                    index
                )));
            }
            if instance.instance_name.trim().is_empty() {
                return Err(Error::config(format!(
                    "instances[{}] ({}): instance_name cannot be empty",
                    index, instance.name
                )));
            }
            if instance.static_ip_name.trim().is_empty() {
                return Err(Error::config(format!(
                    "instances[{}] ({}): static_ip_name cannot be empty",
                    index, instance.name
                )));
            }

            if !seen.insert(instance.name.as_str()) {
                warn!(
                    "Duplicate instance name '{}' at index {}; the first entry will be used",
                    instance.name, index
                );
            }
        }

        Ok(())
    }

    /// Find an instance by logical name
    ///
    /// # Returns
    ///
    /// - `Ok(&InstanceConfig)`: The first record with that name
    /// - `Err(Error::NotFound)`: No record matches
    pub fn find(&self, name: &str) -> Result<&InstanceConfig> {
        self.instances
            .iter()
            .find(|instance| instance.name == name)
            .ok_or_else(|| Error::not_found(name))
    }

    /// All records, in file order
    pub fn list(&self) -> &[InstanceConfig] {
        &self.instances
    }

    /// Number of configured instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether no instances are configured
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "instances": [
            { "name": "proxy-1", "instance_name": "Ubuntu-1", "static_ip_name": "StaticIp-1" },
            { "name": "proxy-2", "instance_name": "Ubuntu-2", "static_ip_name": "StaticIp-2" }
        ]
    }"#;

    #[test]
    fn parses_instances_in_order() {
        let store = ConfigStore::from_json(SAMPLE).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.list()[0].name, "proxy-1");
        assert_eq!(store.list()[1].static_ip_name, "StaticIp-2");
    }

    #[test]
    fn find_returns_matching_record() {
        let store = ConfigStore::from_json(SAMPLE).unwrap();
        let found = store.find("proxy-2").unwrap();
        assert_eq!(found.instance_name, "Ubuntu-2");
    }

    #[test]
    fn find_unknown_is_not_found() {
        let store = ConfigStore::from_json(SAMPLE).unwrap();
        let err = store.find("ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound(ref name) if name == "ghost"));
    }

    #[test]
    fn duplicates_resolve_to_first_entry() {
        let store = ConfigStore::new(vec![
            InstanceConfig::new("dup", "first", "ip-a"),
            InstanceConfig::new("dup", "second", "ip-b"),
        ]);
        assert!(store.validate().is_ok());
        assert_eq!(store.find("dup").unwrap().instance_name, "first");
    }

    #[test]
    fn padded_names_match_exactly() {
        let store = ConfigStore::new(vec![
            InstanceConfig::new("proxy", "Ubuntu-1", "ip-a"),
            InstanceConfig::new(" edge", "Ubuntu-2", "ip-b"),
        ]);
        assert!(store.find(" proxy ").is_err());
        assert_eq!(store.find(" edge").unwrap().instance_name, "Ubuntu-2");
        assert!(store.find("edge").is_err());
    }

    #[test]
    fn empty_field_is_rejected() {
        let err = ConfigStore::from_json(
            r#"{"instances":[{"name":"a","instance_name":"","static_ip_name":"ip"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("instance_name")));
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = ConfigStore::from_json("{\"instances\": 42}").unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.starts_with("failed to parse")));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let store = ConfigStore::from_file(file.path()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigStore::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.starts_with("failed to read config file: ")));
    }

    #[test]
    fn records_serialize_with_wire_names() {
        let value = serde_json::to_value(InstanceConfig::new("a", "b", "c")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "name": "a", "instance_name": "b", "static_ip_name": "c" })
        );
    }
}
