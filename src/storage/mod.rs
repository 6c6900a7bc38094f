mod sqlite_store;

pub use sqlite_store::{SqliteStore, STORAGE_VERSION};
