use attach_files::FilesError;
use attach_ids::{IdError, RecordId};
use attach_types::{NameError, Visibility};

/// Errors returned by store operations.
///
/// Expected outcomes (missing resources, conflicts, denials, bad input) are
/// separate variants from [`StoreError::Storage`], which is the channel for
/// genuine filesystem faults. Use [`StoreError::is_fault`] to tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Metadata resource '{resource}' not found for metadata '{record}'")]
    ResourceNotFound { resource: String, record: String },
    #[error("Metadata '{0}' not found")]
    RecordNotFound(String),
    #[error(
        "A resource with name '{resource}' and status '{visibility}' already exists for metadata '{record_id}'"
    )]
    AlreadyExists {
        resource: String,
        visibility: Visibility,
        record_id: RecordId,
    },
    #[error(transparent)]
    Denied(#[from] AccessDenied),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Storage(#[from] StorageFault),
}

impl StoreError {
    /// True for filesystem and layout faults, false for expected outcomes.
    pub fn is_fault(&self) -> bool {
        matches!(self, StoreError::Storage(_))
    }

    /// True when the resource or its record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ResourceNotFound { .. } | StoreError::RecordNotFound(_)
        )
    }

    /// Wraps a file operation error for `record_id`.
    ///
    /// Pattern errors come from caller input and are reported as invalid input.
    pub(crate) fn files(record_id: RecordId, error: FilesError) -> Self {
        match error {
            FilesError::InvalidPattern { .. } => StoreError::InvalidInput(error.to_string()),
            other => StoreError::Storage(StorageFault::Files {
                record_id,
                source: other,
            }),
        }
    }
}

impl From<IdError> for StoreError {
    fn from(error: IdError) -> Self {
        StoreError::InvalidInput(error.to_string())
    }
}

impl From<NameError> for StoreError {
    fn from(error: NameError) -> Self {
        StoreError::InvalidInput(error.to_string())
    }
}

/// Why an operation was refused.
///
/// The distinction lets the transport layer choose between a login prompt and a
/// hard forbidden response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("authentication is required to access this resource")]
    Unauthenticated,
    #[error("user is not permitted to access this resource")]
    Forbidden,
}

/// A storage fault: the filesystem or the folder layout could not serve a request.
#[derive(Debug, thiserror::Error)]
pub enum StorageFault {
    #[error("storage failure for metadata '{record_id}': {source}")]
    Files {
        record_id: RecordId,
        #[source]
        source: FilesError,
    },
    /// The folder layout could not be derived, usually because the attribute
    /// index is unavailable or returned unusable data.
    #[error("cannot resolve folder for metadata '{record}': {reason}")]
    Layout { record: String, reason: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
