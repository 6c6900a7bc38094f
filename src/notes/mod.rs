mod active;
mod order;
mod store;

pub use active::ActiveNoteController;
pub use order::NoteOrder;
pub use store::{DeleteOutcome, LoadReport, NoteStore, StoreState};
