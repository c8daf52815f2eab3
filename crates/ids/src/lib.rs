//! Record identifiers and bucketed-path utilities.
//!
//! Every catalog record is known by two identifiers:
//!
//! - a public [`RecordUuid`], used by callers and by template-driven layouts
//! - an internal numeric [`RecordId`], used by the bucketed layout
//!
//! ## Bucketed directory layout
//! For a record id `n`, attachments are stored under:
//! `parent_dir/<g>00-<g>99/<n>/`
//!
//! where `g` is `n / 100` left-padded with zeros to at least three digits.
//!
//! Example:
//! `metadata_data/00000-00099/42/`
//!
//! Grouping records by hundreds keeps the fan-out of any single directory bounded
//! even with millions of records, and the mapping is fixed: a record never moves
//! between buckets.

mod record;

pub use record::{RecordId, RecordUuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
