mod note;

pub use note::{now_millis, strip_legacy_order, LegacyNote, Note, NoteTemplate, DEFAULT_TITLE};
