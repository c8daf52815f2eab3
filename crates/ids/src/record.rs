//! Implementation of the record identifier types.

use crate::{IdError, IdResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Minimum width of the zero-padded bucket group.
const BUCKET_GROUP_WIDTH: usize = 3;

/// Number of records that share one bucket folder.
const BUCKET_SIZE: u64 = 100;

/// Internal numeric identifier of a catalog record.
///
/// A `RecordId` is stable for the lifetime of the record; the approved version and
/// its working copy share the same id. Only non-negative values can be
/// represented, so sign and format errors are caught when parsing external input
/// rather than when deriving paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RecordId(u64);

impl RecordId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Parses a decimal record id.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] for empty, signed, or non-numeric input.
    pub fn parse(input: &str) -> IdResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::InvalidInput(format!(
                "record id must be a non-negative integer, got: '{input}'"
            )));
        }
        trimmed
            .parse::<u64>()
            .map(Self)
            .map_err(|e| IdError::InvalidInput(format!("record id '{input}' is out of range: {e}")))
    }

    /// Returns the bucket folder name `<g>00-<g>99`.
    ///
    /// The group `g` is `id / 100` zero-padded to three digits, so ids 0 to 99 live
    /// in `00000-00099` and id 250 in `00200-00299`. Groups past `999` grow wider
    /// (`100000-100099` for id 100000).
    pub fn bucket_name(&self) -> String {
        let group = format!("{:0width$}", self.0 / BUCKET_SIZE, width = BUCKET_GROUP_WIDTH);
        format!("{group}00-{group}99")
    }

    /// Returns `parent_dir/<bucket>/`.
    ///
    /// Used on its own for the removed-records backup area, where the caller
    /// appends the record folder at deletion time.
    pub fn bucket_dir(&self, parent_dir: &Path) -> PathBuf {
        parent_dir.join(self.bucket_name())
    }

    /// Returns `parent_dir/<bucket>/<id>/`.
    pub fn record_dir(&self, parent_dir: &Path) -> PathBuf {
        self.bucket_dir(parent_dir).join(self.0.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s)
    }
}

impl From<u32> for RecordId {
    fn from(value: u32) -> Self {
        Self(u64::from(value))
    }
}

/// Public identifier of a catalog record.
///
/// Catalog UUIDs are usually RFC 4122 strings but any identifier the catalog
/// accepts is allowed, as long as it is safe to embed as a single path segment:
/// template layouts substitute it directly into on-disk folder names.
///
/// # Construction
/// - [`RecordUuid::generate`] allocates a fresh hyphenated v4 UUID.
/// - [`RecordUuid::parse`] validates an externally supplied identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RecordUuid(String);

impl RecordUuid {
    /// Generates a new random record UUID in hyphenated form.
    pub fn generate() -> Self {
        Self(::uuid::Uuid::new_v4().hyphenated().to_string())
    }

    /// Validates an external record identifier.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if the identifier is empty, is `.` or
    /// `..`, or contains `/`, `\`, or control characters.
    pub fn parse(input: &str) -> IdResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(IdError::InvalidInput("record uuid cannot be empty".into()));
        }
        if trimmed == "." || trimmed == ".." {
            return Err(IdError::InvalidInput(format!(
                "record uuid '{trimmed}' is not a valid folder name"
            )));
        }
        if trimmed
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(IdError::InvalidInput(format!(
                "record uuid '{trimmed}' contains a path separator or control character"
            )));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordUuid {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordUuid::parse(s)
    }
}

impl AsRef<str> for RecordUuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RecordUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecordUuid::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_for_small_ids() {
        assert_eq!(RecordId::new(0).bucket_name(), "00000-00099");
        assert_eq!(RecordId::new(7).bucket_name(), "00000-00099");
        assert_eq!(RecordId::new(99).bucket_name(), "00000-00099");
    }

    #[test]
    fn test_bucket_name_groups_by_hundred() {
        assert_eq!(RecordId::new(100).bucket_name(), "00100-00199");
        assert_eq!(RecordId::new(250).bucket_name(), "00200-00299");
    }

    #[test]
    fn test_bucket_name_wide_groups() {
        assert_eq!(RecordId::new(100_000).bucket_name(), "100000-100099");
        assert_eq!(RecordId::new(123_456).bucket_name(), "123400-123499");
    }

    #[test]
    fn test_record_dir_structure() {
        let parent = Path::new("/data/metadata_data");
        let dir = RecordId::new(42).record_dir(parent);
        assert_eq!(dir, PathBuf::from("/data/metadata_data/00000-00099/42"));
    }

    #[test]
    fn test_record_dir_is_deterministic() {
        let parent = Path::new("root");
        let id = RecordId::new(98_765);
        assert_eq!(id.record_dir(parent), id.record_dir(parent));
        assert!(id.record_dir(parent).starts_with(id.bucket_dir(parent)));
    }

    #[test]
    fn test_parse_record_id() {
        assert_eq!(RecordId::parse("42").unwrap(), RecordId::new(42));
        assert_eq!(" 7 ".parse::<RecordId>().unwrap(), RecordId::new(7));
    }

    #[test]
    fn test_parse_rejects_negative_and_non_numeric() {
        assert!(RecordId::parse("-1").is_err());
        assert!(RecordId::parse("+1").is_err());
        assert!(RecordId::parse("abc").is_err());
        assert!(RecordId::parse("").is_err());
        assert!(RecordId::parse("1.5").is_err());
    }

    #[test]
    fn test_parse_rejects_overflow() {
        match RecordId::parse("99999999999999999999999") {
            Err(IdError::InvalidInput(msg)) => assert!(msg.contains("out of range")),
            other => panic!("Expected InvalidInput error, got {other:?}"),
        }
    }

    #[test]
    fn test_generate_produces_valid_uuid() {
        let uuid = RecordUuid::generate();
        assert_eq!(uuid.as_str().len(), 36);
        assert!(RecordUuid::parse(uuid.as_str()).is_ok());
    }

    #[test]
    fn test_uuid_parse_trims() {
        let uuid = RecordUuid::parse("  da165110-88fd-11da-a88f-000d939bc5d8 ").unwrap();
        assert_eq!(uuid.to_string(), "da165110-88fd-11da-a88f-000d939bc5d8");
    }

    #[test]
    fn test_uuid_parse_rejects_unsafe_values() {
        assert!(RecordUuid::parse("").is_err());
        assert!(RecordUuid::parse("..").is_err());
        assert!(RecordUuid::parse("a/b").is_err());
        assert!(RecordUuid::parse("a\\b").is_err());
        assert!(RecordUuid::parse("a\nb").is_err());
    }

    #[test]
    fn test_uuid_serde_round_trip_validates() {
        let uuid: RecordUuid = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(serde_json::to_string(&uuid).unwrap(), "\"abc\"");
        let bad: Result<RecordUuid, _> = serde_json::from_str("\"../x\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_record_dir_under_temp_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = RecordId::new(1234).record_dir(temp.path());
        std::fs::create_dir_all(&dir).unwrap();
        assert!(temp.path().join("01200-01299").join("1234").is_dir());
    }
}
