//! Interfaces of the services the store depends on.
//!
//! The store never looks these up globally; they are passed to
//! [`FilesystemStore::new`](crate::FilesystemStore::new) and shared behind `Arc`s, so
//! tests can substitute fakes and concurrent callers share one instance.

use attach_ids::{RecordId, RecordUuid};
use attach_types::{ApprovalState, Visibility};

/// The caller on whose behalf an operation runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<String>,
}

impl Session {
    /// A caller who has not logged in.
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    /// A logged-in caller.
    pub fn authenticated(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

/// Per-record authorization decisions.
pub trait AccessManager: Send + Sync {
    /// Whether `session` may download resources of `record_id` in the given tier.
    fn can_download(&self, session: &Session, record_id: RecordId, visibility: Visibility) -> bool;

    /// Whether `session` may edit `record_id`.
    fn can_edit(&self, session: &Session, record_id: RecordId) -> bool;
}

/// Maps public record UUIDs to internal ids.
pub trait RecordResolver: Send + Sync {
    /// Returns `None` if no record with this UUID exists in the requested state.
    fn resolve_record_id(&self, uuid: &RecordUuid, approval: ApprovalState) -> Option<RecordId>;
}

/// Attributes of a record taken from the search index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexedAttributes {
    /// First resource identifier code of the record, if any
    pub resource_identifier: Option<String>,

    /// Whether the indexed document is an unapproved working copy
    pub draft: bool,
}

/// Errors from an [`IndexLookup`].
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("record '{0}' is not indexed")]
    NotIndexed(String),
    #[error("index unavailable: {0}")]
    Unavailable(String),
    #[error("malformed index document: {0}")]
    Malformed(String),
}

/// Lookup of indexed attributes, needed only by template folder layouts.
pub trait IndexLookup: Send + Sync {
    fn indexed_attributes(&self, uuid: &RecordUuid) -> Result<IndexedAttributes, LookupError>;
}
