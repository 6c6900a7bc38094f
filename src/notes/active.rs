use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use super::store::{DeleteOutcome, NoteStore, StoreState};
use crate::entity::{LegacyNote, Note, NoteTemplate};
use crate::error::{DocketError, Result};

const DEFAULT_PLACEHOLDER: &str = "unnamed";

/// Editor content that has not been written to the store yet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    title: String,
    body: String,
}

/// Tracks the one note bound to the editor and routes editor content into
/// the [`NoteStore`].
///
/// Pending edits are flushed before anything that would otherwise lose them:
/// switching notes, deleting, or closing.
pub struct ActiveNoteController {
    store: NoteStore,
    active: Option<Uuid>,
    draft: Option<Draft>,
    untitled_placeholder: String,
}

impl ActiveNoteController {
    pub fn new(store: NoteStore) -> Self {
        Self {
            store,
            active: None,
            draft: None,
            untitled_placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }

    pub fn with_untitled_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.untitled_placeholder = placeholder.into();
        self
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn active_uuid(&self) -> Option<Uuid> {
        self.active
    }

    pub fn has_pending_edits(&self) -> bool {
        self.draft.is_some()
    }

    /// Pick the initial active note: the persisted pointer if it still names
    /// a live note, else the first note, else a new one.
    pub async fn initialize(&mut self) -> Result<&Note> {
        if self.store.state() != StoreState::Ready {
            return Err(DocketError::NotReady(
                "note store has not finished loading".to_string(),
            ));
        }

        let stored = self.store.backend().get_active().await?;
        let first = self.store.get_by_position(0).ok().map(|note| note.uuid);
        let uuid = match stored.filter(|uuid| self.store.get(uuid).is_ok()).or(first) {
            Some(uuid) => uuid,
            None => self.store.create_note(NoteTemplate::default()).await?.uuid,
        };

        info!(%uuid, "active note initialized");
        self.activate(uuid).await?;
        self.get_active()
    }

    pub fn get_active(&self) -> Result<&Note> {
        let uuid = self
            .active
            .ok_or_else(|| DocketError::NotReady("no active note".to_string()))?;
        self.store.get(&uuid)
    }

    /// Record editor content without saving it yet.
    pub fn stage_edit(&mut self, title: impl Into<String>, body: impl Into<String>) -> Result<()> {
        if self.active.is_none() {
            return Err(DocketError::NotReady("no active note".to_string()));
        }
        self.draft = Some(Draft {
            title: title.into(),
            body: body.into(),
        });
        Ok(())
    }

    /// Write title and body into the active note and persist it.
    pub async fn save_active(
        &mut self,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Note> {
        let mut note = self.get_active()?.clone();
        let mut title = title.into();
        if title.trim().is_empty() {
            title = self.untitled_placeholder.clone();
        }
        note.apply_edit(title, body.into());
        self.store.upsert(note.clone()).await?;
        self.draft = None;
        Ok(note)
    }

    /// Save staged edits, if any. Returns whether anything was written.
    pub async fn flush(&mut self) -> Result<bool> {
        match self.draft.clone() {
            Some(draft) => {
                self.save_active(draft.title, draft.body).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Switch the editor to another note, saving pending edits first.
    pub async fn set_active(&mut self, uuid: Uuid) -> Result<&Note> {
        self.store.get(&uuid)?;
        self.flush().await?;
        self.activate(uuid).await?;
        self.get_active()
    }

    async fn activate(&mut self, uuid: Uuid) -> Result<()> {
        self.store.backend().put_active(uuid).await?;
        debug!(%uuid, "active note set");
        self.active = Some(uuid);
        self.draft = None;
        Ok(())
    }

    /// Create a note and make it active.
    pub async fn new_note(&mut self, template: NoteTemplate) -> Result<Note> {
        self.flush().await?;
        let note = self.store.create_note(template).await?;
        self.activate(note.uuid).await?;
        Ok(note)
    }

    pub async fn move_note(&mut self, uuid: &Uuid, target: usize) -> Result<()> {
        self.store.move_note(uuid, target).await
    }

    /// Import records in the older inline-position shape.
    pub async fn import_legacy(&mut self, records: Vec<LegacyNote>) -> Result<usize> {
        self.flush().await?;
        self.store.import_legacy(records).await
    }

    /// Delete the active note once the caller has confirmed it. Returns
    /// `None` when not confirmed; otherwise the outcome, whose `replacement`
    /// is now the active note.
    pub async fn delete_active(&mut self, confirmed: bool) -> Result<Option<DeleteOutcome>> {
        let uuid = self.get_active()?.uuid;
        if !confirmed {
            debug!(%uuid, "delete not confirmed");
            return Ok(None);
        }

        self.flush().await?;
        let outcome = self.store.delete(&uuid).await?;
        self.activate(outcome.replacement).await?;
        Ok(Some(outcome))
    }

    /// Flush pending edits before shutdown.
    pub async fn close(&mut self) -> Result<()> {
        self.flush().await?;
        Ok(())
    }

    /// Write the active note's body to `<title>.md` inside `dir`.
    pub async fn export_active(&self, dir: &Path) -> Result<PathBuf> {
        let note = self.get_active()?;
        let stem = file_stem(&note.title, &self.untitled_placeholder);
        let path = dir.join(format!("{}.md", stem));
        tokio::fs::write(&path, note.body.as_bytes()).await?;
        Ok(path)
    }
}

/// Make a title safe to use as a file name.
fn file_stem(title: &str, fallback: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim().trim_matches('.');
    if stem.is_empty() {
        fallback.to_string()
    } else {
        stem.to_string()
    }
}
