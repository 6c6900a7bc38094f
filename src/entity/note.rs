// src/entity/note.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to notes created without one.
pub const DEFAULT_TITLE: &str = "New Note";

/// A single user note. Field names match the stored record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub uuid: Uuid,
    pub title: String,
    pub body: String,
    /// Milliseconds since epoch of the last content mutation.
    pub last_updated: i64,
    /// Reserved for remote sync; nothing reads it yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<i64>,
}

impl Note {
    pub fn new(title: String, body: String) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title,
            body,
            last_updated: now_millis(),
            last_synced: None,
        }
    }

    /// Build a note from a template, filling gaps with defaults.
    pub fn from_template(template: NoteTemplate, default_title: &str) -> Self {
        let title = template
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| default_title.to_string());
        Self::new(title, template.body.unwrap_or_default())
    }

    /// Replace title and body and bump `last_updated`.
    pub fn apply_edit(&mut self, title: String, body: String) {
        self.title = title;
        self.body = body;
        self.last_updated = now_millis().max(self.last_updated);
    }
}

/// Optional starting content for a new note.
#[derive(Debug, Clone, Default)]
pub struct NoteTemplate {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl NoteTemplate {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            body: None,
        }
    }
}

/// Older note records carried their list position inline as `listOrder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyNote {
    #[serde(flatten)]
    pub note: Note,
    #[serde(default)]
    pub list_order: Option<i64>,
}

/// Sort legacy records by their inline position and strip it.
///
/// Records without a position keep their input order and follow the
/// positioned ones.
pub fn strip_legacy_order(mut records: Vec<LegacyNote>) -> Vec<Note> {
    // stable sort keeps input order for ties and for unpositioned records
    records.sort_by_key(|r| match r.list_order {
        Some(order) => (0, order),
        None => (1, 0),
    });
    records.into_iter().map(|r| r.note).collect()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_defaults() {
        let note = Note::from_template(NoteTemplate::default(), DEFAULT_TITLE);
        assert_eq!(note.title, "New Note");
        assert_eq!(note.body, "");
        assert!(note.last_synced.is_none());

        let note = Note::from_template(
            NoteTemplate {
                title: Some(String::new()),
                body: Some("# hi".to_string()),
            },
            "Untitled",
        );
        assert_eq!(note.title, "Untitled");
        assert_eq!(note.body, "# hi");
    }

    #[test]
    fn test_record_shape_is_camel_case() {
        let note = Note::new("A".to_string(), "body".to_string());
        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("lastUpdated").is_some());
        assert!(json.get("lastSynced").is_none());
        assert_eq!(json["uuid"], note.uuid.to_string());
    }

    #[test]
    fn test_apply_edit_never_moves_timestamp_backwards() {
        let mut note = Note::new("A".to_string(), String::new());
        note.last_updated = i64::MAX - 1;
        note.apply_edit("B".to_string(), "x".to_string());
        assert_eq!(note.title, "B");
        assert_eq!(note.last_updated, i64::MAX - 1);
    }

    #[test]
    fn test_strip_legacy_order() {
        let json = r#"[
            {"uuid": "00000000-0000-0000-0000-000000000003", "title": "C", "body": "", "lastUpdated": 3, "listOrder": 2},
            {"uuid": "00000000-0000-0000-0000-000000000009", "title": "Z", "body": "", "lastUpdated": 9},
            {"uuid": "00000000-0000-0000-0000-000000000001", "title": "A", "body": "", "lastUpdated": 1, "listOrder": 0},
            {"uuid": "00000000-0000-0000-0000-000000000002", "title": "B", "body": "", "lastUpdated": 2, "listOrder": 1}
        ]"#;
        let records: Vec<LegacyNote> = serde_json::from_str(json).unwrap();
        let titles: Vec<String> = strip_legacy_order(records)
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["A", "B", "C", "Z"]);
    }
}
