pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod notes;
pub mod storage;

pub use config::DocketConfig;
pub use entity::{Note, NoteTemplate};
pub use error::{DocketError, Result};
pub use notes::{ActiveNoteController, NoteStore};
pub use storage::SqliteStore;
