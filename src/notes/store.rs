use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::order::NoteOrder;
use crate::entity::{strip_legacy_order, LegacyNote, Note, NoteTemplate, DEFAULT_TITLE};
use crate::error::{DocketError, Result};
use crate::storage::SqliteStore;

/// Lifecycle of a [`NoteStore`]. Mutations are only accepted in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Loading,
    Ready,
}

/// Result of deleting a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub removed: Uuid,
    pub removed_position: usize,
    /// Note that should become active: position 0, or a freshly
    /// synthesized note when the store became empty.
    pub replacement: Uuid,
    pub synthesized: bool,
}

/// What `load_from_persistence` had to fix while rebuilding the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub notes: usize,
    /// The order record existed but could not be decoded.
    pub corrupt_order: bool,
    /// Order entries dropped because no note content backs them.
    pub dropped: usize,
    /// Notes missing from the order record, appended at the end.
    pub appended: usize,
}

impl LoadReport {
    pub fn repaired(&self) -> bool {
        self.corrupt_order || self.dropped > 0 || self.appended > 0
    }
}

/// In-memory index of notes: content by UUID, a dense position order, and
/// tombstones for deleted UUIDs. Every mutation is written through to the
/// backing [`SqliteStore`] before it returns.
pub struct NoteStore {
    backend: SqliteStore,
    notes: HashMap<Uuid, Note>,
    order: NoteOrder,
    tombstones: HashSet<Uuid>,
    state: StoreState,
    default_title: String,
}

impl NoteStore {
    pub fn new(backend: SqliteStore) -> Self {
        Self {
            backend,
            notes: HashMap::new(),
            order: NoteOrder::new(),
            tombstones: HashSet::new(),
            state: StoreState::Uninitialized,
            default_title: DEFAULT_TITLE.to_string(),
        }
    }

    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    pub fn backend(&self) -> &SqliteStore {
        &self.backend
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn tombstones(&self) -> &HashSet<Uuid> {
        &self.tombstones
    }

    pub fn position_of(&self, uuid: &Uuid) -> Option<usize> {
        self.order.position_of(uuid)
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            StoreState::Ready => Ok(()),
            state => Err(DocketError::NotReady(format!(
                "note store is {:?}",
                state
            ))),
        }
    }

    /// Mutations check readiness and the connection before touching memory.
    fn ensure_writable(&self) -> Result<()> {
        self.ensure_ready()?;
        self.backend.ensure_open()
    }

    /// Fetch notes, order and tombstones from the backend and rebuild the
    /// index. A repaired order is written back.
    pub async fn load(&mut self) -> Result<LoadReport> {
        let previous = self.state;
        self.state = StoreState::Loading;
        let fetched = async {
            let tombstones = self.backend.get_tombstones().await?;
            let notes = self.backend.get_all_notes().await?;
            let order = self.backend.get_order().await?;
            Ok::<_, DocketError>((tombstones, notes, order))
        }
        .await;

        let (tombstones, notes, order) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                // a store that was already serving stays ready
                self.state = previous;
                return Err(e);
            }
        };

        self.tombstones = tombstones.into_iter().collect();
        let report = self.load_from_persistence(notes, order);
        if report.repaired() {
            self.backend.put_order(self.order.encode()?).await?;
        }
        info!(
            notes = report.notes,
            tombstones = self.tombstones.len(),
            "loaded note store"
        );
        Ok(report)
    }

    /// Replace the whole index from persisted records.
    ///
    /// Order entries without content are dropped. Notes the order record
    /// does not mention are appended oldest first, so notes added by
    /// `upsert` keep their append order. With no usable order record the
    /// whole ordering is most recently updated first.
    pub fn load_from_persistence(
        &mut self,
        notes: Vec<Note>,
        serialized_order: Option<String>,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        let mut live: Vec<Note> = notes
            .into_iter()
            .filter(|note| !self.tombstones.contains(&note.uuid))
            .collect();

        let stored = match serialized_order.as_deref().map(NoteOrder::decode) {
            Some(Ok(uuids)) => Some(uuids),
            Some(Err(e)) => {
                warn!(error = %e, "discarding unreadable order record");
                report.corrupt_order = true;
                None
            }
            None => None,
        };

        match stored {
            Some(_) => live.sort_by(|a, b| {
                a.last_updated
                    .cmp(&b.last_updated)
                    .then_with(|| a.uuid.cmp(&b.uuid))
            }),
            None => live.sort_by(|a, b| {
                b.last_updated
                    .cmp(&a.last_updated)
                    .then_with(|| a.uuid.cmp(&b.uuid))
            }),
        }

        self.notes = HashMap::with_capacity(live.len());
        let mut fallback = Vec::with_capacity(live.len());
        for note in live {
            if !self.notes.contains_key(&note.uuid) {
                fallback.push(note.uuid);
            }
            self.notes.insert(note.uuid, note);
        }

        let mut order = NoteOrder::new();
        for uuid in stored.unwrap_or_default() {
            if self.notes.contains_key(&uuid) {
                order.push(uuid);
            } else {
                report.dropped += 1;
            }
        }
        for uuid in fallback {
            if !order.contains(&uuid) {
                order.push(uuid);
                report.appended += 1;
            }
        }
        if report.dropped > 0 || report.appended > 0 {
            warn!(
                dropped = report.dropped,
                appended = report.appended,
                "repaired note order"
            );
        }

        self.order = order;
        report.notes = self.notes.len();
        self.state = StoreState::Ready;
        report
    }

    pub fn get(&self, uuid: &Uuid) -> Result<&Note> {
        self.ensure_ready()?;
        self.notes
            .get(uuid)
            .filter(|_| self.order.contains(uuid))
            .ok_or_else(|| DocketError::NotFound(format!("note {}", uuid)))
    }

    pub fn get_by_position(&self, position: usize) -> Result<&Note> {
        self.ensure_ready()?;
        let uuid = self
            .order
            .uuid_at(position)
            .ok_or_else(|| DocketError::NotFound(format!("position {}", position)))?;
        self.get(&uuid)
    }

    /// Notes in position order.
    pub fn ordered(&self) -> impl Iterator<Item = &Note> {
        self.order.iter().filter_map(|uuid| self.notes.get(uuid))
    }

    /// Insert or overwrite a note. New UUIDs are appended at the end; known
    /// UUIDs keep their position. Returns the note's position.
    pub async fn upsert(&mut self, note: Note) -> Result<usize> {
        self.ensure_writable()?;
        if self.tombstones.contains(&note.uuid) {
            return Err(DocketError::InvalidArgument(format!(
                "note {} was deleted",
                note.uuid
            )));
        }

        let position = self.order.push(note.uuid);
        debug!(uuid = %note.uuid, position, "upsert note");
        self.notes.insert(note.uuid, note.clone());
        self.backend.put_note(note).await?;
        Ok(position)
    }

    /// Create a note with a fresh UUID at the end of the order.
    pub async fn create_note(&mut self, template: NoteTemplate) -> Result<Note> {
        self.ensure_writable()?;
        let note = Note::from_template(template, &self.default_title);
        self.upsert(note.clone()).await?;
        self.backend.put_order(self.order.encode()?).await?;
        Ok(note)
    }

    /// Delete a note, compact positions and pick the note to fall back to.
    pub async fn delete(&mut self, uuid: &Uuid) -> Result<DeleteOutcome> {
        self.ensure_writable()?;
        let removed_position = self
            .order
            .remove(uuid)
            .ok_or_else(|| DocketError::NotFound(format!("note {}", uuid)))?;
        self.notes.remove(uuid);
        self.tombstones.insert(*uuid);
        debug!(%uuid, position = removed_position, "delete note");
        self.backend.delete_note(*uuid).await?;

        let (replacement, synthesized) = match self.order.uuid_at(0) {
            Some(first) => (first, false),
            None => {
                let blank = Note::from_template(NoteTemplate::default(), &self.default_title);
                let id = blank.uuid;
                self.order.push(id);
                self.notes.insert(id, blank.clone());
                self.backend.put_note(blank).await?;
                (id, true)
            }
        };

        self.backend.put_order(self.order.encode()?).await?;
        Ok(DeleteOutcome {
            removed: *uuid,
            removed_position,
            replacement,
            synthesized,
        })
    }

    /// Move a note to an existing position. Content is untouched; only the
    /// order record is written, and nothing at all for a same-slot move.
    pub async fn move_note(&mut self, uuid: &Uuid, target: usize) -> Result<()> {
        self.ensure_writable()?;
        let (old, target) = self.order.move_to(uuid, target)?;
        if old == target {
            return Ok(());
        }
        debug!(%uuid, from = old, to = target, "move note");
        self.backend.put_order(self.order.encode()?).await
    }

    /// Import records in the older shape that carried `listOrder` inline.
    ///
    /// Records are ordered by that field, stripped of it and fed through
    /// `upsert`. Tombstoned UUIDs are skipped. Returns how many notes were
    /// written.
    pub async fn import_legacy(&mut self, records: Vec<LegacyNote>) -> Result<usize> {
        self.ensure_writable()?;
        let mut imported = 0;
        for note in strip_legacy_order(records) {
            if self.tombstones.contains(&note.uuid) {
                debug!(uuid = %note.uuid, "skipping deleted note during import");
                continue;
            }
            self.upsert(note).await?;
            imported += 1;
        }
        self.backend.put_order(self.order.encode()?).await?;
        info!(imported, "imported legacy notes");
        Ok(imported)
    }

    /// Both maps agree, positions are dense and every position has content.
    pub fn is_consistent(&self) -> bool {
        self.order.is_consistent() && self.order.iter().all(|uuid| self.notes.contains_key(uuid))
    }
}
