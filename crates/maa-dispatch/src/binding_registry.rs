//! Durable operator <-> device binding registry.
//!
//! The registry keeps two indices (operator -> binding, device -> operator)
//! that always describe the same bijection. Every mutation is persisted as a
//! whole-set snapshot through [`maa_core::write_text_atomic`] before it is
//! reported as successful; a failed write rolls the in-memory change back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use maa_core::write_text_atomic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BINDING_SCHEMA_VERSION: u32 = 1;
pub const BINDINGS_FILE_NAME: &str = "bindings.json";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Exclusive pairing of one operator to one device plus the channel to notify.
pub struct DeviceBinding {
    pub operator_id: String,
    pub device_id: String,
    pub channel: String,
}

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("operator '{operator_id}' is already bound to device '{device_id}'")]
    AlreadyBoundByOperator {
        operator_id: String,
        device_id: String,
    },
    #[error("device '{device_id}' is already bound to another operator")]
    AlreadyBoundByDevice { device_id: String },
    #[error("operator '{operator_id}' has no bound device")]
    NotBound { operator_id: String },
    #[error("failed to persist bindings: {0:#}")]
    Persist(anyhow::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct BindingRecord {
    device_id: String,
    user_id: String,
    #[serde(alias = "umo")]
    channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct BindingRegistryFile {
    schema_version: u32,
    #[serde(default)]
    bindings: BTreeMap<String, BindingRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredBindings {
    Versioned(BindingRegistryFile),
    Legacy(BTreeMap<String, BindingRecord>),
}

#[derive(Debug, Default)]
pub struct BindingRegistry {
    path: Option<PathBuf>,
    bindings: BTreeMap<String, DeviceBinding>,
    device_index: BTreeMap<String, String>,
}

impl BindingRegistry {
    /// Registry that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the snapshot at `path`; a missing file yields an empty registry.
    pub fn open(path: &Path) -> Result<Self> {
        let mut registry = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        for (operator_id, record) in load_binding_records(path)? {
            if let Some(existing) = registry.device_index.get(&record.device_id) {
                tracing::warn!(
                    operator = %operator_id,
                    device = %record.device_id,
                    claimed_by = %existing,
                    "skipping binding for a device already claimed in {}",
                    path.display()
                );
                continue;
            }
            registry
                .device_index
                .insert(record.device_id.clone(), operator_id.clone());
            registry.bindings.insert(
                operator_id.clone(),
                DeviceBinding {
                    operator_id,
                    device_id: record.device_id,
                    channel: record.channel,
                },
            );
        }
        Ok(registry)
    }

    /// Like [`BindingRegistry::open`], but an unreadable snapshot is logged and
    /// replaced by an empty registry bound to the same path.
    pub fn open_or_empty(path: &Path) -> Self {
        match Self::open(path) {
            Ok(registry) => {
                tracing::info!(
                    bindings = registry.len(),
                    path = %path.display(),
                    "loaded device bindings"
                );
                registry
            }
            Err(error) => {
                tracing::error!(path = %path.display(), "failed to load device bindings: {error:#}");
                Self {
                    path: Some(path.to_path_buf()),
                    ..Self::default()
                }
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &DeviceBinding> {
        self.bindings.values()
    }

    pub fn bind(
        &mut self,
        operator_id: &str,
        device_id: &str,
        channel: &str,
    ) -> Result<DeviceBinding, BindingError> {
        if let Some(existing) = self.bindings.get(operator_id) {
            return Err(BindingError::AlreadyBoundByOperator {
                operator_id: operator_id.to_string(),
                device_id: existing.device_id.clone(),
            });
        }
        if self.device_index.contains_key(device_id) {
            return Err(BindingError::AlreadyBoundByDevice {
                device_id: device_id.to_string(),
            });
        }

        let binding = DeviceBinding {
            operator_id: operator_id.to_string(),
            device_id: device_id.to_string(),
            channel: channel.to_string(),
        };
        self.bindings
            .insert(operator_id.to_string(), binding.clone());
        self.device_index
            .insert(device_id.to_string(), operator_id.to_string());

        if let Err(error) = self.persist() {
            self.bindings.remove(operator_id);
            self.device_index.remove(device_id);
            return Err(BindingError::Persist(error));
        }
        Ok(binding)
    }

    /// Removes the operator's binding and returns the released device id.
    pub fn unbind(&mut self, operator_id: &str) -> Result<String, BindingError> {
        let Some(binding) = self.bindings.remove(operator_id) else {
            return Err(BindingError::NotBound {
                operator_id: operator_id.to_string(),
            });
        };
        self.device_index.remove(&binding.device_id);

        if let Err(error) = self.persist() {
            self.device_index
                .insert(binding.device_id.clone(), operator_id.to_string());
            self.bindings.insert(operator_id.to_string(), binding);
            return Err(BindingError::Persist(error));
        }
        Ok(binding.device_id)
    }

    pub fn lookup_by_operator(&self, operator_id: &str) -> Option<&DeviceBinding> {
        self.bindings.get(operator_id)
    }

    pub fn lookup_by_device(&self, device_id: &str) -> Option<&str> {
        self.device_index.get(device_id).map(String::as_str)
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let file = BindingRegistryFile {
            schema_version: BINDING_SCHEMA_VERSION,
            bindings: self
                .bindings
                .iter()
                .map(|(operator_id, binding)| {
                    (
                        operator_id.clone(),
                        BindingRecord {
                            device_id: binding.device_id.clone(),
                            user_id: operator_id.clone(),
                            channel: binding.channel.clone(),
                        },
                    )
                })
                .collect(),
        };
        let mut payload =
            serde_json::to_string_pretty(&file).context("failed to encode device bindings")?;
        payload.push('\n');
        write_text_atomic(path, &payload)
            .with_context(|| format!("failed to write device bindings {}", path.display()))
    }
}

fn load_binding_records(path: &Path) -> Result<BTreeMap<String, BindingRecord>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read device bindings {}", path.display()))?;
    let parsed = serde_json::from_str::<StoredBindings>(&raw)
        .with_context(|| format!("failed to parse device bindings {}", path.display()))?;
    match parsed {
        StoredBindings::Versioned(file) => {
            if file.schema_version != BINDING_SCHEMA_VERSION {
                bail!(
                    "unsupported bindings schema_version {} in {} (expected {})",
                    file.schema_version,
                    path.display(),
                    BINDING_SCHEMA_VERSION
                );
            }
            Ok(file.bindings)
        }
        StoredBindings::Legacy(bindings) => Ok(bindings),
    }
}

#[cfg(test)]
mod tests {
    use super::{BindingError, BindingRegistry, BINDINGS_FILE_NAME};
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn assert_bijection(registry: &BindingRegistry) {
        let mut seen_devices = std::collections::BTreeSet::new();
        for binding in registry.bindings() {
            assert!(seen_devices.insert(binding.device_id.clone()));
            assert_eq!(
                registry.lookup_by_device(&binding.device_id),
                Some(binding.operator_id.as_str())
            );
        }
        assert_eq!(seen_devices.len(), registry.device_index.len());
    }

    #[test]
    fn unit_bind_and_lookup_both_directions() {
        let mut registry = BindingRegistry::in_memory();
        let binding = registry.bind("u1", "d1", "qq:group:1").expect("bind");
        assert_eq!(binding.device_id, "d1");
        assert_eq!(
            registry.lookup_by_operator("u1").map(|b| b.channel.as_str()),
            Some("qq:group:1")
        );
        assert_eq!(registry.lookup_by_device("d1"), Some("u1"));
        assert!(registry.lookup_by_device("d2").is_none());
    }

    #[test]
    fn regression_rebind_is_rejected_without_mutation() {
        let mut registry = BindingRegistry::in_memory();
        registry.bind("u1", "d1", "c1").expect("bind u1");

        let error = registry.bind("u1", "d2", "c1").expect_err("operator conflict");
        assert!(matches!(
            error,
            BindingError::AlreadyBoundByOperator { ref device_id, .. } if device_id == "d1"
        ));
        let error = registry.bind("u2", "d1", "c2").expect_err("device conflict");
        assert!(matches!(error, BindingError::AlreadyBoundByDevice { .. }));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup_by_device("d1"), Some("u1"));
        assert!(registry.lookup_by_device("d2").is_none());
        assert!(registry.lookup_by_operator("u2").is_none());
    }

    #[test]
    fn functional_unbind_releases_device_for_other_operator() {
        let mut registry = BindingRegistry::in_memory();
        registry.bind("u1", "d1", "c1").expect("bind");
        assert_eq!(registry.unbind("u1").expect("unbind"), "d1");
        assert!(matches!(
            registry.unbind("u1"),
            Err(BindingError::NotBound { .. })
        ));
        registry.bind("u2", "d1", "c2").expect("rebind to u2");
        assert_eq!(registry.lookup_by_device("d1"), Some("u2"));
    }

    #[test]
    fn integration_bindings_survive_reopen_and_rebuild_inverse_index() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(BINDINGS_FILE_NAME);
        {
            let mut registry = BindingRegistry::open(&path).expect("open");
            registry.bind("u1", "d1", "c1").expect("bind u1");
            registry.bind("u2", "d2", "c2").expect("bind u2");
            registry.unbind("u2").expect("unbind u2");
        }
        let raw = std::fs::read_to_string(&path).expect("read snapshot");
        assert!(raw.contains("\"schema_version\": 1"));
        assert!(raw.ends_with('\n'));

        let reopened = BindingRegistry::open(&path).expect("reopen");
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.lookup_by_device("d1"), Some("u1"));
        assert!(reopened.lookup_by_device("d2").is_none());
    }

    #[test]
    fn functional_open_accepts_legacy_unversioned_snapshot() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(BINDINGS_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"u1": {"device_id": "d1", "user_id": "u1", "umo": "aiocqhttp:FriendMessage:1"}}"#,
        )
        .expect("write legacy");
        let registry = BindingRegistry::open(&path).expect("open legacy");
        assert_eq!(
            registry.lookup_by_operator("u1").map(|b| b.channel.as_str()),
            Some("aiocqhttp:FriendMessage:1")
        );
        assert_eq!(registry.lookup_by_device("d1"), Some("u1"));
    }

    #[test]
    fn regression_open_rejects_unknown_schema_and_open_or_empty_recovers() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(BINDINGS_FILE_NAME);
        std::fs::write(&path, r#"{"schema_version": 9, "bindings": {}}"#).expect("write");
        let error = BindingRegistry::open(&path).expect_err("schema mismatch");
        assert!(error.to_string().contains("unsupported bindings schema_version 9"));

        let registry = BindingRegistry::open_or_empty(&path);
        assert!(registry.is_empty());
        assert_eq!(registry.path(), Some(path.as_path()));
    }

    #[test]
    fn regression_open_skips_duplicate_device_claims() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(BINDINGS_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"schema_version": 1, "bindings": {
                "a": {"device_id": "d1", "user_id": "a", "channel": "ca"},
                "b": {"device_id": "d1", "user_id": "b", "channel": "cb"}
            }}"#,
        )
        .expect("write");
        let registry = BindingRegistry::open(&path).expect("open");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup_by_device("d1"), Some("a"));
        assert_bijection(&registry);
    }

    #[test]
    fn regression_failed_persist_rolls_back_bind() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("as-directory");
        std::fs::create_dir_all(&path).expect("create blocking directory");
        let mut registry = BindingRegistry {
            path: Some(path),
            ..BindingRegistry::default()
        };
        let error = registry.bind("u1", "d1", "c1").expect_err("persist failure");
        assert!(matches!(error, BindingError::Persist(_)));
        assert!(registry.is_empty());
        assert!(registry.lookup_by_device("d1").is_none());
    }

    #[derive(Debug, Clone)]
    enum RegistryOp {
        Bind(u8, u8),
        Unbind(u8),
    }

    fn registry_op() -> impl Strategy<Value = RegistryOp> {
        prop_oneof![
            (0u8..5, 0u8..5).prop_map(|(op, device)| RegistryOp::Bind(op, device)),
            (0u8..5).prop_map(RegistryOp::Unbind),
        ]
    }

    proptest! {
        #[test]
        fn unit_bind_unbind_sequences_preserve_bijection(ops in proptest::collection::vec(registry_op(), 0..64)) {
            let mut registry = BindingRegistry::in_memory();
            for op in ops {
                match op {
                    RegistryOp::Bind(operator, device) => {
                        let before = registry.len();
                        let result = registry.bind(&format!("u{operator}"), &format!("d{device}"), "c");
                        if result.is_err() {
                            prop_assert_eq!(registry.len(), before);
                        }
                    }
                    RegistryOp::Unbind(operator) => {
                        let _ = registry.unbind(&format!("u{operator}"));
                    }
                }
                for binding in registry.bindings() {
                    prop_assert_eq!(
                        registry.lookup_by_device(&binding.device_id),
                        Some(binding.operator_id.as_str())
                    );
                }
                prop_assert_eq!(registry.bindings.len(), registry.device_index.len());
            }
        }
    }
}
