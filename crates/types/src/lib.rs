//! Shared value types for the attachment store.
//!
//! These types are deliberately small and validated on construction so that the
//! rest of the workspace can rely on their invariants without re-checking:
//!
//! - [`Visibility`]: the public/private tier a resource lives in
//! - [`ApprovalState`]: whether a record is the approved version or a working copy
//! - [`ResourceName`]: a safe, relative resource name that may contain subfolders

mod name;

pub use name::{NameError, ResourceName};

use std::{fmt, str::FromStr};

/// Visibility tier of a stored resource.
///
/// The lowercase string form is also the name of the tier folder on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// Both tiers, public first.
    pub const ALL: [Visibility; 2] = [Visibility::Public, Visibility::Private];

    /// Returns the folder / wire name of this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = NameError;

    /// Parses `public` or `private`, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(NameError::Invalid(format!(
                "unknown visibility '{other}', expected 'public' or 'private'"
            ))),
        }
    }
}

/// Approval state of the record a request targets.
///
/// A working copy is an unapproved draft of a published record. Working copies
/// share the record id of the approved version but never overwrite existing
/// resources silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    #[default]
    Approved,
    WorkingCopy,
}

impl ApprovalState {
    /// Maps the boolean "approved" flag used by upstream callers.
    pub fn from_approved(approved: bool) -> Self {
        if approved {
            ApprovalState::Approved
        } else {
            ApprovalState::WorkingCopy
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalState::Approved)
    }
}
