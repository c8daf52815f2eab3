//! Local record registry.
//!
//! Outside a catalog there is no database to resolve record UUIDs or index to look
//! attributes up in, so the CLI reads both from a YAML file:
//!
//! ```yaml
//! records:
//!   - uuid: 7a1c4e2b-0d51-4f4b-9a3e-1f1a7d8e2c10
//!     id: 42
//!     resource_identifier: ABC-1
//!     working_copy: true
//! ```
//!
//! `working_copy` marks records that also have an unapproved working copy; the index
//! reports those as drafts.

use anyhow::Context;
use attach_core::{
    AccessManager, ApprovalState, IndexLookup, IndexedAttributes, LookupError, RecordId,
    RecordResolver, RecordUuid, Session, Visibility,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    records: Vec<RegistryEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct RegistryEntry {
    uuid: RecordUuid,
    id: RecordId,
    #[serde(default)]
    resource_identifier: Option<String>,
    #[serde(default)]
    working_copy: bool,
}

/// Records known to the CLI, keyed by UUID.
#[derive(Clone, Debug, Default)]
pub struct RecordRegistry {
    records: HashMap<RecordUuid, RegistryEntry>,
}

impl RecordRegistry {
    /// Loads the registry; a missing file is an empty registry.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "record registry {} not found, no records can be resolved",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read record registry {}", path.display()))?;
        let registry = Self::from_yaml(&content)
            .with_context(|| format!("invalid record registry {}", path.display()))?;
        tracing::debug!("loaded {} records from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let file: RegistryFile = serde_yaml::from_str(content)?;

        let mut records = HashMap::with_capacity(file.records.len());
        for entry in file.records {
            if let Some(previous) = records.insert(entry.uuid.clone(), entry) {
                anyhow::bail!("record {} is listed more than once", previous.uuid);
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

impl RecordResolver for RecordRegistry {
    fn resolve_record_id(&self, uuid: &RecordUuid, approval: ApprovalState) -> Option<RecordId> {
        let entry = self.records.get(uuid)?;
        match approval {
            ApprovalState::Approved => Some(entry.id),
            ApprovalState::WorkingCopy => entry.working_copy.then_some(entry.id),
        }
    }
}

impl IndexLookup for RecordRegistry {
    fn indexed_attributes(&self, uuid: &RecordUuid) -> Result<IndexedAttributes, LookupError> {
        let entry = self
            .records
            .get(uuid)
            .ok_or_else(|| LookupError::NotIndexed(uuid.to_string()))?;
        Ok(IndexedAttributes {
            resource_identifier: entry.resource_identifier.clone(),
            draft: entry.working_copy,
        })
    }
}

/// The person running the CLI on the storage host; holds every grant.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalOperator;

impl AccessManager for LocalOperator {
    fn can_download(&self, _session: &Session, _record_id: RecordId, _visibility: Visibility) -> bool {
        true
    }

    fn can_edit(&self, _session: &Session, _record_id: RecordId) -> bool {
        true
    }
}
