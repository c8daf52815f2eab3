//! # Attach Core
//!
//! Filesystem-backed storage for the files attached to catalog records.
//!
//! This crate contains the store and everything it needs to decide where a file lives
//! and who may touch it:
//! - Folder layouts (bucketed by record id, or templated from indexed attributes)
//! - Authorization of every operation through injected collaborators
//! - Listing, reading, writing, moving and deleting resources
//! - Moving whole record folders and pruning the folders they leave behind
//!
//! **No transport concerns**: sessions, record resolution and the attribute index are
//! provided by the caller through the traits in [`collaborators`].

pub mod access;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod error;
pub mod layout;
pub mod resource;
pub mod store;

#[cfg(test)]
mod test_support;

pub use access::AccessGuard;
pub use collaborators::{
    AccessManager, IndexLookup, IndexedAttributes, LookupError, RecordResolver, Session,
};
pub use config::{FolderPrivileges, FolderStructure, StoreConfig};
pub use error::{AccessDenied, StorageFault, StoreError, StoreResult};
pub use layout::PathResolver;
pub use resource::{
    CleanupOutcome, CopyFailure, CopySummary, ResourceContainerDescriptor, ResourceDescriptor,
    ResourceHolder,
};
pub use store::{FilesystemStore, ResourceStore};

pub use attach_files::RenameOutcome;
pub use attach_ids::{RecordId, RecordUuid};
pub use attach_types::{ApprovalState, ResourceName, Visibility};
