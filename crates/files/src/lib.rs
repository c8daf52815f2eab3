//! Attachment file storage primitives
//!
//! This crate provides the raw filesystem operations used by the attachment store.
//! It knows nothing about records, visibility, or authorization; callers hand it
//! concrete paths and it performs the I/O with the guarantees the store relies on.
//!
//! ## Guarantees
//!
//! - Writes are atomic: content goes to a fresh temporary file in the destination
//!   directory which then replaces the target, so readers never see a partial file
//!   and concurrent writers race only at the final rename (last writer wins)
//! - Directory creation is idempotent and tolerates concurrent creators
//! - Listings skip hidden entries and flatten subfolders into `/`-joined names
//! - Directory moves prune emptied ancestors but never the configured root
//!
//! ## Example Usage
//!
//! ```no_run
//! use attach_files::{write_atomic, DirectoryMover};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let target = Path::new("metadata_data/00000-00099/42/public/map.png");
//! write_atomic(target, &mut &b"png bytes"[..])?;
//!
//! let mover = DirectoryMover::new("metadata_data");
//! mover.rename(
//!     Path::new("metadata_data/00000-00099/42"),
//!     Path::new("metadata_data/res/ABC-1"),
//! );
//! # Ok(())
//! # }
//! ```

mod files;
mod mover;

pub use files::{
    copy_file, ensure_dir, file_info, list_files, move_file, remove_file, remove_tree,
    set_modified, write_atomic, FileInfo, ListedFile,
};
#[cfg(any(test, feature = "test-hooks"))]
pub use files::force_removal_error_for_current_thread;
pub use mover::{DirectoryMover, RenameOutcome};

use std::path::{Path, PathBuf};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// An I/O operation failed on a specific path
    #[error("failed to {operation} '{path}': {source}", path = path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file name filter could not be compiled
    #[error("invalid file name pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl FilesError {
    pub(crate) fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        FilesError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns true when the underlying I/O error is `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FilesError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Result type for file operations.
pub type FilesResult<T> = Result<T, FilesError>;
