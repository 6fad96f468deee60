//! Query-string helpers.
//!
//! Browsers send `?course_id=&search=` for untouched filter inputs. These
//! deserializers treat such empty values as absent instead of failing.

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

pub fn deserialize_optional_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Uuid::parse_str(s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Trimmed, non-empty string or `None`.
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Filter {
        #[serde(default, deserialize_with = "deserialize_optional_uuid")]
        course_id: Option<Uuid>,
        #[serde(default, deserialize_with = "deserialize_optional_string")]
        search: Option<String>,
    }

    #[test]
    fn test_empty_values_are_none() {
        let f: Filter = serde_json::from_str(r#"{"course_id":"","search":"   "}"#).unwrap();
        assert!(f.course_id.is_none());
        assert!(f.search.is_none());
    }

    #[test]
    fn test_values_are_parsed() {
        let id = Uuid::new_v4();
        let f: Filter =
            serde_json::from_str(&format!(r#"{{"course_id":"{id}","search":" ada "}}"#)).unwrap();
        assert_eq!(f.course_id, Some(id));
        assert_eq!(f.search.as_deref(), Some("ada"));
    }

    #[test]
    fn test_missing_fields_default_to_none() {
        let f: Filter = serde_json::from_str("{}").unwrap();
        assert!(f.course_id.is_none());
        assert!(f.search.is_none());
    }

    #[test]
    fn test_invalid_uuid_is_rejected() {
        assert!(serde_json::from_str::<Filter>(r#"{"course_id":"nope"}"#).is_err());
    }
}
