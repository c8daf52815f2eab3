//! Store runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the store. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{
    DEFAULT_BACKUP_DIR, DEFAULT_DATA_DIR, DEFAULT_NODE_URL, RESOURCE_IDENTIFIER_PLACEHOLDER,
    UUID_PLACEHOLDER,
};
use crate::{StoreError, StoreResult};
use attach_types::Visibility;
use std::path::{Path, PathBuf};

/// How record folders are laid out under the data directory.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum FolderStructure {
    /// `<g>00-<g>99/<record id>`, grouping records by hundreds.
    #[default]
    Bucketed,
    /// A folder template substituted with indexed record attributes, for example
    /// `res/{index:resourceIdentifier}`.
    Template(String),
}

/// Whether record folders are split into visibility tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FolderPrivileges {
    /// `public/` and `private/` subfolders beneath each record folder.
    #[default]
    Default,
    /// Everything stored flat in the record folder; private operations are no-ops.
    None,
}

impl FolderPrivileges {
    /// Maps a requested visibility to the one actually stored on disk.
    ///
    /// Without tier folders there is no private tier, so `Private` becomes `Public`.
    pub fn effective_visibility(&self, requested: Visibility) -> Visibility {
        match self {
            FolderPrivileges::Default => requested,
            FolderPrivileges::None => Visibility::Public,
        }
    }

    /// True when a request for `visibility` must be skipped entirely.
    pub fn skips(&self, visibility: Visibility) -> bool {
        matches!(
            (self, visibility),
            (FolderPrivileges::None, Visibility::Private)
        )
    }
}

/// Store configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    data_dir: PathBuf,
    backup_dir: PathBuf,
    node_url: String,
    folder_structure: FolderStructure,
    folder_privileges: FolderPrivileges,
}

impl StoreConfig {
    /// Create a new `StoreConfig`.
    ///
    /// The node URL gets a trailing `/` if it lacks one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if the node URL is empty or the folder
    /// template is unusable (see [`validate_folder_template`]).
    pub fn new(
        data_dir: PathBuf,
        backup_dir: PathBuf,
        node_url: String,
        folder_structure: FolderStructure,
        folder_privileges: FolderPrivileges,
    ) -> StoreResult<Self> {
        let node_url = node_url.trim().to_string();
        if node_url.is_empty() {
            return Err(StoreError::InvalidInput("node_url cannot be empty".into()));
        }
        let node_url = if node_url.ends_with('/') {
            node_url
        } else {
            format!("{node_url}/")
        };

        if let FolderStructure::Template(template) = &folder_structure {
            validate_folder_template(template)?;
        }

        Ok(Self {
            data_dir,
            backup_dir,
            node_url,
            folder_structure,
            folder_privileges,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    pub fn folder_structure(&self) -> &FolderStructure {
        &self.folder_structure
    }

    pub fn folder_privileges(&self) -> FolderPrivileges {
        self.folder_privileges
    }
}

/// Check that a folder template is safe to substitute and join under the data directory.
///
/// The template must be relative, must not contain `.` or `..` segments, and must
/// reference at least one of `{index:resourceIdentifier}` or `{index:uuid}`, otherwise
/// every record would share one folder.
pub fn validate_folder_template(template: &str) -> StoreResult<()> {
    let template = template.trim();
    if template.is_empty() {
        return Err(StoreError::InvalidInput(
            "folder template cannot be empty".into(),
        ));
    }
    if template.starts_with('/') || template.contains('\\') {
        return Err(StoreError::InvalidInput(format!(
            "folder template '{template}' must be a relative '/'-separated path"
        )));
    }
    if template
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StoreError::InvalidInput(format!(
            "folder template '{template}' contains an empty or relative segment"
        )));
    }
    if !template.contains(RESOURCE_IDENTIFIER_PLACEHOLDER) && !template.contains(UUID_PLACEHOLDER)
    {
        return Err(StoreError::InvalidInput(format!(
            "folder template '{template}' must contain {RESOURCE_IDENTIFIER_PLACEHOLDER} or {UUID_PLACEHOLDER}"
        )));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the data directory from an optional environment value.
pub fn data_dir_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Resolve the backup directory from an optional environment value.
pub fn backup_dir_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR))
}

/// Resolve the node URL from an optional environment value.
pub fn node_url_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_NODE_URL.to_string())
}

/// Parse the folder structure from optional `structure` and `template` values.
///
/// `structure` accepts `default` / `bucketed` (the default when unset) or
/// `template` / `custom`, which requires a non-empty `template`.
pub fn folder_structure_from_env_values(
    structure: Option<String>,
    template: Option<String>,
) -> StoreResult<FolderStructure> {
    let structure = non_blank(structure).map(|s| s.to_ascii_lowercase());
    match structure.as_deref() {
        None | Some("default") | Some("bucketed") => Ok(FolderStructure::Bucketed),
        Some("template") | Some("custom") => {
            let template = non_blank(template).ok_or_else(|| {
                StoreError::InvalidInput(
                    "a folder template is required for the template folder structure".into(),
                )
            })?;
            validate_folder_template(&template)?;
            Ok(FolderStructure::Template(template))
        }
        Some(other) => Err(StoreError::InvalidInput(format!(
            "unknown folder structure '{other}', expected 'bucketed' or 'template'"
        ))),
    }
}

/// Parse the folder privileges mode from an optional value (`default` when unset).
pub fn folder_privileges_from_env_value(value: Option<String>) -> StoreResult<FolderPrivileges> {
    match non_blank(value).map(|s| s.to_ascii_lowercase()).as_deref() {
        None | Some("default") => Ok(FolderPrivileges::Default),
        Some("none") => Ok(FolderPrivileges::None),
        Some(other) => Err(StoreError::InvalidInput(format!(
            "unknown folder privileges mode '{other}', expected 'default' or 'none'"
        ))),
    }
}
