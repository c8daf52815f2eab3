//! Descriptors and outcomes returned by store operations.

use crate::constants::{ATTACHMENTS_SEGMENT, RECORDS_API_PATH};
use crate::{StoreError, StoreResult};
use attach_files::FileInfo;
use attach_ids::{RecordId, RecordUuid};
use attach_types::{ApprovalState, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Id of a resource as exposed to clients: `{uuid}/attachments/{name}`.
pub fn resource_id(uuid: &RecordUuid, name: &str) -> String {
    format!("{uuid}/{ATTACHMENTS_SEGMENT}/{name}")
}

/// Download URL of a resource.
pub fn resource_url(node_url: &str, uuid: &RecordUuid, name: &str) -> String {
    format!("{}/{}", container_url(node_url, uuid), name)
}

/// URL listing all resources of a record.
pub fn container_url(node_url: &str, uuid: &RecordUuid) -> String {
    format!("{node_url}{RECORDS_API_PATH}{uuid}/{ATTACHMENTS_SEGMENT}")
}

/// Description of one stored file, derived from filesystem metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: String,
    pub record_uuid: RecordUuid,
    pub record_id: RecordId,

    /// Relative name beneath the tier folder, `/`-separated
    pub filename: String,
    pub url: String,
    pub visibility: Visibility,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub approval: ApprovalState,
}

impl ResourceDescriptor {
    pub(crate) fn new(
        node_url: &str,
        uuid: &RecordUuid,
        record_id: RecordId,
        filename: &str,
        visibility: Visibility,
        info: FileInfo,
        approval: ApprovalState,
    ) -> Self {
        Self {
            id: resource_id(uuid, filename),
            record_uuid: uuid.clone(),
            record_id,
            filename: filename.to_string(),
            url: resource_url(node_url, uuid, filename),
            visibility,
            size_bytes: info.size_bytes,
            last_modified: info.modified,
            approval,
        }
    }
}

/// Description of a record's root folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContainerDescriptor {
    pub record_uuid: RecordUuid,
    pub record_id: RecordId,
    pub url: String,
    pub directory: PathBuf,
    pub approval: ApprovalState,
}

/// A located resource: its on-disk path together with its descriptor.
///
/// Deleting a resource consumes the holder, so a path is never reused after the
/// file behind it is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHolder {
    path: PathBuf,
    descriptor: ResourceDescriptor,
}

impl ResourceHolder {
    pub(crate) fn new(path: PathBuf, descriptor: ResourceDescriptor) -> Self {
        Self { path, descriptor }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Opens the file for reading.
    pub fn open(&self) -> StoreResult<File> {
        File::open(&self.path).map_err(|e| {
            StoreError::files(
                self.descriptor.record_id,
                attach_files::FilesError::Io {
                    operation: "open",
                    path: self.path.clone(),
                    source: e,
                },
            )
        })
    }

    pub fn into_parts(self) -> (PathBuf, ResourceDescriptor) {
        (self.path, self.descriptor)
    }
}

/// Outcome of a best-effort removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Removed { target: String },
    /// Nothing to do: already gone, or not applicable in the current layout
    Skipped { target: String },
    Failed { target: String, reason: String },
}

impl CleanupOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CleanupOutcome::Failed { .. })
    }

    pub fn target(&self) -> &str {
        match self {
            CleanupOutcome::Removed { target }
            | CleanupOutcome::Skipped { target }
            | CleanupOutcome::Failed { target, .. } => target,
        }
    }
}

impl fmt::Display for CleanupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupOutcome::Removed { target } => write!(f, "{target} removed."),
            CleanupOutcome::Skipped { target } => write!(f, "{target} skipped, nothing to remove."),
            CleanupOutcome::Failed { target, reason } => {
                write!(f, "Unable to remove {target}: {reason}")
            }
        }
    }
}

/// A resource that could not be copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyFailure {
    pub resource: String,
    pub reason: String,
}

/// Result of copying the resources of one record to another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopySummary {
    pub copied: Vec<ResourceDescriptor>,
    pub failed: Vec<CopyFailure>,
}

impl CopySummary {
    /// True when no resource failed to copy.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
