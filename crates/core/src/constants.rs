//! Constants used throughout the attachment store.
//!
//! Path segments, placeholders and defaults live here so the layout rules stay
//! consistent between path derivation, URLs and configuration.

/// Default directory holding record attachment folders.
pub const DEFAULT_DATA_DIR: &str = "data/metadata_data";

/// Default directory receiving backups of removed records.
pub const DEFAULT_BACKUP_DIR: &str = "data/removed";

/// Default public URL of the catalog node.
pub const DEFAULT_NODE_URL: &str = "http://localhost:8080/catalog/srv/";

/// File name filter matching every resource.
pub const DEFAULT_FILTER: &str = "*";

/// Path of the records API below the node URL.
pub const RECORDS_API_PATH: &str = "api/records/";

/// Segment between a record UUID and a resource name in resource ids and URLs.
pub const ATTACHMENTS_SEGMENT: &str = "attachments";

/// Template placeholder replaced by the indexed resource identifier.
pub const RESOURCE_IDENTIFIER_PLACEHOLDER: &str = "{index:resourceIdentifier}";

/// Template placeholder replaced by the record UUID.
pub const UUID_PLACEHOLDER: &str = "{index:uuid}";

/// Prefix shared by all template placeholders.
pub const PLACEHOLDER_PREFIX: &str = "{index:";

/// Suffix appended to the final folder of a working copy in template layouts.
pub const DRAFT_SUFFIX: &str = "-draft";
