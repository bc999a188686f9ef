//! Wire types for the Nextcloud Notes API v1
//!
//! The Notes API has no fields for notebook assignment or a manual sort
//! position, so both are smuggled through fields it does have: the notebook
//! id rides in `category` as a stringified number, and the sort key is
//! appended to the body as a trailing HTML comment that readers strip.

use serde::{Deserialize, Serialize};

/// A note as the Notes API returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextcloudNote {
    pub id: i64,

    #[serde(default)]
    pub etag: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content: String,

    /// Folder-like grouping field, repurposed to carry a notebook id.
    #[serde(default)]
    pub category: String,

    /// Last modification, epoch seconds.
    #[serde(default)]
    pub modified: i64,

    #[serde(default)]
    pub favorite: bool,
}

/// Request body for `POST notes` and `PUT notes/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct NoteUpsert {
    pub title: String,
    pub content: String,
    pub category: String,
    pub modified: i64,
}

/// `ocs/v2.php/cloud/capabilities` response envelope.
#[derive(Debug, Deserialize)]
pub struct OcsEnvelope {
    pub ocs: Ocs,
}

#[derive(Debug, Deserialize)]
pub struct Ocs {
    pub data: OcsData,
}

#[derive(Debug, Deserialize)]
pub struct OcsData {
    #[serde(default)]
    pub capabilities: OcsCapabilities,
}

#[derive(Debug, Default, Deserialize)]
pub struct OcsCapabilities {
    #[serde(default)]
    pub notes: Option<NotesCapability>,
}

/// Capability block the Notes app publishes.
#[derive(Debug, Deserialize)]
pub struct NotesCapability {
    #[serde(default)]
    pub api_version: Vec<String>,

    #[serde(default)]
    pub version: Option<String>,
}

/// Marker prefix for the comment-encoded sort key.
const SORT_MARKER_PREFIX: &str = "<!-- sort:";
const SORT_MARKER_SUFFIX: &str = " -->";

/// Append the comment-encoded sort key to an outgoing body.
pub fn append_sort_marker(body: &str, sort_key: Option<i64>) -> String {
    match sort_key {
        Some(key) => format!("{body}\n\n{SORT_MARKER_PREFIX}{key}{SORT_MARKER_SUFFIX}"),
        None => body.to_string(),
    }
}

/// Strip and parse the trailing sort marker from an incoming body.
///
/// Bodies without a marker pass through unchanged. A malformed marker is
/// treated as ordinary content.
pub fn split_sort_marker(body: &str) -> (String, Option<i64>) {
    let trimmed = body.trim_end();
    let Some(start) = trimmed.rfind(SORT_MARKER_PREFIX) else {
        return (body.to_string(), None);
    };

    let candidate = &trimmed[start..];
    let Some(inner) = candidate
        .strip_prefix(SORT_MARKER_PREFIX)
        .and_then(|rest| rest.strip_suffix(SORT_MARKER_SUFFIX))
    else {
        return (body.to_string(), None);
    };

    match inner.trim().parse::<i64>() {
        Ok(key) => (trimmed[..start].trim_end().to_string(), Some(key)),
        Err(_) => (body.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_marker_roundtrip() {
        let body = append_sort_marker("milk and eggs", Some(42));
        assert_eq!(body, "milk and eggs\n\n<!-- sort:42 -->");

        let (content, sort_key) = split_sort_marker(&body);
        assert_eq!(content, "milk and eggs");
        assert_eq!(sort_key, Some(42));
    }

    #[test]
    fn test_body_without_marker_passes_through() {
        let (content, sort_key) = split_sort_marker("plain body\nwith lines");
        assert_eq!(content, "plain body\nwith lines");
        assert_eq!(sort_key, None);
    }

    #[test]
    fn test_malformed_marker_is_kept_as_content() {
        let body = "text\n\n<!-- sort:not-a-number -->";
        let (content, sort_key) = split_sort_marker(body);
        assert_eq!(content, body);
        assert_eq!(sort_key, None);
    }

    #[test]
    fn test_no_marker_appended_without_sort_key() {
        assert_eq!(append_sort_marker("body", None), "body");
    }

    #[test]
    fn test_note_deserializes_with_missing_optional_fields() {
        let note: NextcloudNote =
            serde_json::from_str(r#"{"id": 5, "title": "t", "modified": 100}"#).unwrap();
        assert_eq!(note.id, 5);
        assert_eq!(note.content, "");
        assert_eq!(note.category, "");
        assert!(note.etag.is_none());
    }
}
