//! Folder layout of record attachments.
//!
//! [`PathResolver`] maps a record to its folder under the data directory and then to
//! the visibility tier and resource beneath it. It performs no I/O except, for
//! template layouts, the attribute lookup through [`IndexLookup`].
//!
//! ## Bucketed layout
//!
//! ```text
//! <data_dir>/00000-00099/42/public/map.png
//! <data_dir>/00000-00099/42/private/notes/report.pdf
//! ```
//!
//! ## Template layout
//!
//! `res/{index:resourceIdentifier}` for a working copy with identifier `ABC-1`:
//!
//! ```text
//! <data_dir>/res/ABC-1-draft/public/map.png
//! ```
//!
//! With [`FolderPrivileges::None`] the `public`/`private` level is omitted.

use crate::collaborators::{IndexLookup, IndexedAttributes};
use crate::config::{FolderPrivileges, FolderStructure, StoreConfig};
use crate::constants::{
    DRAFT_SUFFIX, PLACEHOLDER_PREFIX, RESOURCE_IDENTIFIER_PLACEHOLDER, UUID_PLACEHOLDER,
};
use crate::{StorageFault, StoreResult};
use attach_ids::{RecordId, RecordUuid};
use attach_types::{ResourceName, Visibility};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Derives record, tier and resource paths for the configured layout.
#[derive(Clone)]
pub struct PathResolver {
    config: Arc<StoreConfig>,
    index: Option<Arc<dyn IndexLookup>>,
}

impl std::fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver")
            .field("config", &self.config)
            .field("index", &self.index.is_some())
            .finish()
    }
}

impl PathResolver {
    /// `index` is only consulted by template layouts.
    pub fn new(config: Arc<StoreConfig>, index: Option<Arc<dyn IndexLookup>>) -> Self {
        Self { config, index }
    }

    /// Returns the root folder of a record.
    ///
    /// # Errors
    ///
    /// For template layouts, returns [`StorageFault::Layout`] if no index lookup is
    /// configured, the lookup fails, or the substituted folder is unusable.
    pub fn record_dir(&self, record_id: RecordId, uuid: &RecordUuid) -> StoreResult<PathBuf> {
        let dir = match self.config.folder_structure() {
            FolderStructure::Bucketed => record_id.record_dir(self.config.data_dir()),
            FolderStructure::Template(template) => {
                let index = self.index.as_ref().ok_or_else(|| StorageFault::Layout {
                    record: uuid.to_string(),
                    reason: "the folder template needs an index lookup, none is configured"
                        .into(),
                })?;
                let attributes =
                    index
                        .indexed_attributes(uuid)
                        .map_err(|e| StorageFault::Layout {
                            record: uuid.to_string(),
                            reason: e.to_string(),
                        })?;
                let relative = expand_template(template, uuid, &attributes).map_err(|reason| {
                    StorageFault::Layout {
                        record: uuid.to_string(),
                        reason,
                    }
                })?;
                relative
                    .split('/')
                    .fold(self.config.data_dir().to_path_buf(), |dir, segment| {
                        dir.join(segment)
                    })
            }
        };

        tracing::debug!("record {} ({}) maps to {}", uuid, record_id, dir.display());
        Ok(dir)
    }

    /// Appends the visibility tier folder when tier folders are enabled.
    pub fn tier_dir(&self, record_dir: &Path, visibility: Visibility) -> PathBuf {
        match self.config.folder_privileges() {
            FolderPrivileges::Default => record_dir.join(visibility.as_str()),
            FolderPrivileges::None => record_dir.to_path_buf(),
        }
    }

    /// The folder holding `name`: the tier folder plus the name's subfolder, if any.
    pub fn resource_dir(&self, tier_dir: &Path, name: &ResourceName) -> PathBuf {
        match name.subfolder() {
            Some(subfolder) => subfolder
                .split('/')
                .fold(tier_dir.to_path_buf(), |dir, segment| dir.join(segment)),
            None => tier_dir.to_path_buf(),
        }
    }

    /// Full path of `name` beneath `tier_dir`.
    pub fn resource_path(&self, tier_dir: &Path, name: &ResourceName) -> PathBuf {
        self.resource_dir(tier_dir, name).join(name.file_name())
    }

    pub fn effective_visibility(&self, visibility: Visibility) -> Visibility {
        self.config
            .folder_privileges()
            .effective_visibility(visibility)
    }

    /// Bucket folder under the backup directory receiving removed records.
    pub fn removed_bucket_dir(&self, record_id: RecordId) -> PathBuf {
        record_id.bucket_dir(self.config.backup_dir())
    }
}

/// Substitutes indexed attributes into a folder template.
///
/// A non-empty resource identifier replaces `{index:resourceIdentifier}`; without
/// one, that placeholder falls back to the record UUID. The identifier is used
/// verbatim, surrounding whitespace included. `{index:uuid}` is always
/// the record UUID. Working copies get `-draft` appended to the final segment.
///
/// Returns the reason as an error if a substituted value would add or escape a
/// folder level, or if an unknown placeholder remains.
pub fn expand_template(
    template: &str,
    uuid: &RecordUuid,
    attributes: &IndexedAttributes,
) -> Result<String, String> {
    let identifier = attributes
        .resource_identifier
        .as_deref()
        .filter(|value| !value.is_empty());

    let mut expanded = template.trim().to_string();
    match identifier {
        Some(identifier) => {
            if identifier.contains(['/', '\\']) || identifier == "." || identifier == ".." {
                return Err(format!(
                    "resource identifier '{identifier}' cannot be used as a folder name"
                ));
            }
            expanded = expanded.replace(RESOURCE_IDENTIFIER_PLACEHOLDER, identifier);
        }
        None => {
            expanded = expanded.replace(RESOURCE_IDENTIFIER_PLACEHOLDER, uuid.as_str());
        }
    }
    expanded = expanded.replace(UUID_PLACEHOLDER, uuid.as_str());

    if expanded.contains(PLACEHOLDER_PREFIX) {
        return Err(format!(
            "folder template '{template}' has an unsupported placeholder"
        ));
    }

    if attributes.draft {
        expanded.push_str(DRAFT_SUFFIX);
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeIndex;

    fn uuid() -> RecordUuid {
        RecordUuid::parse("7a1c4e2b-0d51-4f4b-9a3e-1f1a7d8e2c10").unwrap()
    }

    fn resolver(
        structure: FolderStructure,
        privileges: FolderPrivileges,
        index: Option<FakeIndex>,
    ) -> PathResolver {
        let config = StoreConfig::new(
            PathBuf::from("/data"),
            PathBuf::from("/removed"),
            "http://localhost/srv/".into(),
            structure,
            privileges,
        )
        .unwrap();
        PathResolver::new(
            Arc::new(config),
            index.map(|i| Arc::new(i) as Arc<dyn IndexLookup>),
        )
    }

    #[test]
    fn test_bucketed_record_dir() {
        let paths = resolver(FolderStructure::Bucketed, FolderPrivileges::Default, None);

        assert_eq!(
            paths.record_dir(RecordId::new(42), &uuid()).unwrap(),
            PathBuf::from("/data/00000-00099/42")
        );
        assert_eq!(
            paths.record_dir(RecordId::new(250), &uuid()).unwrap(),
            PathBuf::from("/data/00200-00299/250")
        );
    }

    #[test]
    fn test_tier_dir_depends_on_privileges() {
        let tiers = resolver(FolderStructure::Bucketed, FolderPrivileges::Default, None);
        let flat = resolver(FolderStructure::Bucketed, FolderPrivileges::None, None);
        let record = Path::new("/data/00000-00099/42");

        assert_eq!(
            tiers.tier_dir(record, Visibility::Private),
            record.join("private")
        );
        assert_eq!(flat.tier_dir(record, Visibility::Private), record);
        assert_eq!(
            flat.effective_visibility(Visibility::Private),
            Visibility::Public
        );
    }

    #[test]
    fn test_nested_resource_paths() {
        let paths = resolver(FolderStructure::Bucketed, FolderPrivileges::Default, None);
        let tier = Path::new("/data/00000-00099/42/public");
        let nested = ResourceName::new("maps/2024/map.png").unwrap();
        let plain = ResourceName::new("map.png").unwrap();

        assert_eq!(paths.resource_dir(tier, &nested), tier.join("maps").join("2024"));
        assert_eq!(
            paths.resource_path(tier, &nested),
            tier.join("maps").join("2024").join("map.png")
        );
        assert_eq!(paths.resource_dir(tier, &plain), tier);
    }

    #[test]
    fn test_template_with_identifier_and_draft() {
        let index = FakeIndex::default().with(
            &uuid(),
            IndexedAttributes {
                resource_identifier: Some("ABC-1".into()),
                draft: true,
            },
        );
        let paths = resolver(
            FolderStructure::Template("res/{index:resourceIdentifier}".into()),
            FolderPrivileges::Default,
            Some(index),
        );

        assert_eq!(
            paths.record_dir(RecordId::new(42), &uuid()).unwrap(),
            PathBuf::from("/data/res/ABC-1-draft")
        );
    }

    #[test]
    fn test_template_falls_back_to_uuid() {
        let attributes = IndexedAttributes {
            resource_identifier: Some(String::new()),
            draft: false,
        };

        assert_eq!(
            expand_template("res/{index:resourceIdentifier}", &uuid(), &attributes).unwrap(),
            format!("res/{}", uuid())
        );
        assert_eq!(
            expand_template("by-uuid/{index:uuid}", &uuid(), &attributes).unwrap(),
            format!("by-uuid/{}", uuid())
        );
    }

    #[test]
    fn test_template_keeps_identifier_verbatim() {
        let attributes = IndexedAttributes {
            resource_identifier: Some(" ABC-1 ".into()),
            draft: false,
        };

        assert_eq!(
            expand_template("res/{index:resourceIdentifier}", &uuid(), &attributes).unwrap(),
            "res/ ABC-1 "
        );
    }

    #[test]
    fn test_template_rejects_unsafe_identifier() {
        for identifier in ["a/b", "..", "a\\b"] {
            let attributes = IndexedAttributes {
                resource_identifier: Some(identifier.into()),
                draft: false,
            };
            assert!(expand_template("res/{index:resourceIdentifier}", &uuid(), &attributes)
                .is_err());
        }
    }

    #[test]
    fn test_template_rejects_unknown_placeholder() {
        let result = expand_template(
            "res/{index:uuid}/{index:title}",
            &uuid(),
            &IndexedAttributes::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_template_lookup_failure_is_layout_fault() {
        let paths = resolver(
            FolderStructure::Template("{index:uuid}".into()),
            FolderPrivileges::Default,
            Some(FakeIndex::unavailable()),
        );

        let err = paths.record_dir(RecordId::new(1), &uuid()).unwrap_err();

        assert!(err.is_fault());
    }

    #[test]
    fn test_template_without_index_is_layout_fault() {
        let paths = resolver(
            FolderStructure::Template("{index:uuid}".into()),
            FolderPrivileges::Default,
            None,
        );

        assert!(paths.record_dir(RecordId::new(1), &uuid()).unwrap_err().is_fault());
    }

    #[test]
    fn test_removed_bucket_dir() {
        let paths = resolver(FolderStructure::Bucketed, FolderPrivileges::Default, None);

        assert_eq!(
            paths.removed_bucket_dir(RecordId::new(1234)),
            PathBuf::from("/removed/01200-01299")
        );
    }
}
