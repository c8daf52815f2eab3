//! Validated resource names.

/// Segment inserted between the record UUID and the file name in resource ids.
const ATTACHMENTS_SEGMENT: &str = "attachments";

/// Errors that can occur when creating validated names.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NameError {
    /// The input was empty or contained only whitespace
    #[error("name cannot be empty")]
    Empty,

    /// The input could escape its parent directory or is otherwise unusable as a path
    #[error("invalid name: {0}")]
    Invalid(String),
}

/// A resource name relative to its tier directory.
///
/// Names may address files in subfolders using `/` as the separator, for example
/// `images/overview/map.png`. Construction guarantees the name stays below the
/// directory it is resolved against:
///
/// - no leading `/` and no empty segments
/// - no `.` or `..` segments
/// - no backslashes or NUL bytes
///
/// Leading and trailing whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName(String);

impl ResourceName {
    /// Validates `input` as a relative resource name.
    pub fn new(input: impl AsRef<str>) -> Result<Self, NameError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(NameError::Empty);
        }

        if trimmed.contains('\\') || trimmed.contains('\0') {
            return Err(NameError::Invalid(format!(
                "'{trimmed}' contains a backslash or NUL byte"
            )));
        }

        if trimmed.starts_with('/') {
            return Err(NameError::Invalid(format!("'{trimmed}' must be relative")));
        }

        for segment in trimmed.split('/') {
            match segment {
                "" => {
                    return Err(NameError::Invalid(format!(
                        "'{trimmed}' contains an empty path segment"
                    )))
                }
                "." | ".." => {
                    return Err(NameError::Invalid(format!(
                        "'{trimmed}' contains a relative path segment"
                    )))
                }
                _ => {}
            }
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Parses a name that may be given in resource id form.
    ///
    /// Resource ids look like `{record_uuid}/attachments/{name}`; the prefix is
    /// stripped when it matches `record_uuid`. Any other input is validated as a
    /// plain name.
    pub fn from_resource_id(input: &str, record_uuid: &str) -> Result<Self, NameError> {
        let prefix = format!("{record_uuid}/{ATTACHMENTS_SEGMENT}/");
        match input.trim().strip_prefix(prefix.as_str()) {
            Some(rest) => Self::new(rest),
            None => Self::new(input),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final segment of the name.
    pub fn file_name(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((_, file)) => file,
            None => &self.0,
        }
    }

    /// The subfolder part of a nested name, if any.
    pub fn subfolder(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(folder, _)| folder)
    }

    /// Iterates the `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for ResourceName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceName::new(s)
    }
}

impl serde::Serialize for ResourceName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ResourceName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ResourceName::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        let name = ResourceName::new("map.png").unwrap();
        assert_eq!(name.as_str(), "map.png");
        assert_eq!(name.file_name(), "map.png");
        assert_eq!(name.subfolder(), None);
    }

    #[test]
    fn test_nested_name_splits_subfolder() {
        let name = ResourceName::new("images/overview/map.png").unwrap();
        assert_eq!(name.file_name(), "map.png");
        assert_eq!(name.subfolder(), Some("images/overview"));
        assert_eq!(name.segments().count(), 3);
    }

    #[test]
    fn test_name_is_trimmed() {
        let name = ResourceName::new("  doc.pdf \n").unwrap();
        assert_eq!(name.as_str(), "doc.pdf");
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(ResourceName::new("   "), Err(NameError::Empty));
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(ResourceName::new("../secret").is_err());
        assert!(ResourceName::new("a/../../b").is_err());
        assert!(ResourceName::new("./a").is_err());
        assert!(ResourceName::new("..").is_err());
    }

    #[test]
    fn test_rejects_absolute_and_malformed() {
        assert!(ResourceName::new("/etc/passwd").is_err());
        assert!(ResourceName::new("a//b").is_err());
        assert!(ResourceName::new("dir/").is_err());
        assert!(ResourceName::new("a\\b").is_err());
        assert!(ResourceName::new("a\0b").is_err());
    }

    #[test]
    fn test_dotfile_names_are_allowed() {
        assert!(ResourceName::new(".thumbnail.png").is_ok());
        assert!(ResourceName::new("a..b.txt").is_ok());
    }

    #[test]
    fn test_from_resource_id_strips_matching_prefix() {
        let name = ResourceName::from_resource_id("abc-123/attachments/img/map.png", "abc-123")
            .unwrap();
        assert_eq!(name.as_str(), "img/map.png");
    }

    #[test]
    fn test_from_resource_id_keeps_other_prefixes() {
        let name =
            ResourceName::from_resource_id("other/attachments/map.png", "abc-123").unwrap();
        assert_eq!(name.as_str(), "other/attachments/map.png");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ResourceName = serde_json::from_str("\"a/b.txt\"").unwrap();
        assert_eq!(ok.as_str(), "a/b.txt");
        let bad: Result<ResourceName, _> = serde_json::from_str("\"../x\"");
        assert!(bad.is_err());
    }
}
