//! Dense position index over note UUIDs.
//!
//! Positions always form the contiguous range `[0, len)`. The forward
//! direction is a `Vec` so position lookups are direct and a move only
//! rotates the slice between the old and new slot; the reverse direction is
//! a hash map that is patched for exactly the slots a mutation touched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocketError, Result};

/// One `[position, uuid]` pair of the persisted order record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderEntry(usize, String);

#[derive(Debug, Clone, Default)]
pub struct NoteOrder {
    by_position: Vec<Uuid>,
    by_uuid: HashMap<Uuid, usize>,
}

impl NoteOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an order from a sequence, ignoring repeated UUIDs.
    pub fn from_sequence(uuids: impl IntoIterator<Item = Uuid>) -> Self {
        let mut order = Self::new();
        for uuid in uuids {
            if !order.contains(&uuid) {
                order.push(uuid);
            }
        }
        order
    }

    pub fn len(&self) -> usize {
        self.by_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_position.is_empty()
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.by_uuid.contains_key(uuid)
    }

    pub fn position_of(&self, uuid: &Uuid) -> Option<usize> {
        self.by_uuid.get(uuid).copied()
    }

    pub fn uuid_at(&self, position: usize) -> Option<Uuid> {
        self.by_position.get(position).copied()
    }

    /// UUIDs in ascending position order.
    pub fn iter(&self) -> impl Iterator<Item = &Uuid> {
        self.by_position.iter()
    }

    /// Append a UUID at the end and return its position. A UUID that is
    /// already present keeps its position.
    pub fn push(&mut self, uuid: Uuid) -> usize {
        if let Some(position) = self.position_of(&uuid) {
            return position;
        }
        let position = self.by_position.len();
        self.by_position.push(uuid);
        self.by_uuid.insert(uuid, position);
        position
    }

    /// Remove a UUID and close the gap it leaves. Returns the freed position.
    pub fn remove(&mut self, uuid: &Uuid) -> Option<usize> {
        let position = self.by_uuid.remove(uuid)?;
        self.by_position.remove(position);
        self.reindex(position, self.by_position.len());
        Some(position)
    }

    /// Move `uuid` to `target`, shifting every entry strictly between the
    /// old and new slot one step toward the vacated slot.
    ///
    /// Returns `(old_position, target)`. Only the `min..=max` window of
    /// the two positions is rewritten.
    pub fn move_to(&mut self, uuid: &Uuid, target: usize) -> Result<(usize, usize)> {
        let old = self
            .position_of(uuid)
            .ok_or_else(|| DocketError::NotFound(format!("note {}", uuid)))?;
        if target >= self.len() {
            return Err(DocketError::InvalidArgument(format!(
                "target position {} is out of range 0..{}",
                target,
                self.len()
            )));
        }

        if old < target {
            self.by_position[old..=target].rotate_left(1);
            self.reindex(old, target + 1);
        } else if old > target {
            self.by_position[target..=old].rotate_right(1);
            self.reindex(target, old + 1);
        }

        Ok((old, target))
    }

    fn reindex(&mut self, from: usize, to: usize) {
        for position in from..to {
            self.by_uuid.insert(self.by_position[position], position);
        }
    }

    /// Serialize to the order record: `[[position, "uuid"], ...]` ascending.
    pub fn encode(&self) -> Result<String> {
        let entries: Vec<OrderEntry> = self
            .by_position
            .iter()
            .enumerate()
            .map(|(position, uuid)| OrderEntry(position, uuid.to_string()))
            .collect();
        Ok(serde_json::to_string(&entries)?)
    }

    /// Decode an order record into UUIDs sorted by their stored position.
    ///
    /// Entries whose UUID does not parse are dropped; they cannot match any
    /// note. Gaps and duplicates are left for the caller to repair.
    pub fn decode(raw: &str) -> Result<Vec<Uuid>> {
        let mut entries: Vec<OrderEntry> = serde_json::from_str(raw)
            .map_err(|e| DocketError::CorruptOrderRecord(e.to_string()))?;
        entries.sort_by_key(|entry| entry.0);
        Ok(entries
            .into_iter()
            .filter_map(|OrderEntry(_, uuid)| Uuid::parse_str(&uuid).ok())
            .collect())
    }

    /// True when both directions agree over a dense `[0, len)` range.
    pub fn is_consistent(&self) -> bool {
        self.by_position.len() == self.by_uuid.len()
            && self
                .by_position
                .iter()
                .enumerate()
                .all(|(position, uuid)| self.by_uuid.get(uuid) == Some(&position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn snapshot(order: &NoteOrder) -> Vec<Uuid> {
        order.iter().copied().collect()
    }

    #[test]
    fn test_push_appends_at_end() {
        let u = ids(3);
        let mut order = NoteOrder::new();
        assert_eq!(order.push(u[0]), 0);
        assert_eq!(order.push(u[1]), 1);
        assert_eq!(order.push(u[0]), 0);
        assert_eq!(order.push(u[2]), 2);
        assert_eq!(order.len(), 3);
        assert!(order.is_consistent());
    }

    #[test]
    fn test_move_up_shifts_window_down() {
        let u = ids(3);
        let mut order = NoteOrder::from_sequence(u.clone());

        assert_eq!(order.move_to(&u[2], 0).unwrap(), (2, 0));
        assert_eq!(snapshot(&order), vec![u[2], u[0], u[1]]);
        assert!(order.is_consistent());
    }

    #[test]
    fn test_move_down_shifts_window_up() {
        let u = ids(5);
        let mut order = NoteOrder::from_sequence(u.clone());

        order.move_to(&u[1], 3).unwrap();
        assert_eq!(snapshot(&order), vec![u[0], u[2], u[3], u[1], u[4]]);
        assert!(order.is_consistent());
    }

    #[test]
    fn test_move_only_touches_entries_between() {
        let u = ids(8);
        let mut order = NoteOrder::from_sequence(u.clone());
        let (old, target) = order.move_to(&u[6], 2).unwrap();

        for (before, uuid) in u.iter().enumerate() {
            let after = order.position_of(uuid).unwrap();
            if *uuid == u[6] {
                assert_eq!(after, target);
            } else if before >= target && before < old {
                assert_eq!(after, before + 1);
            } else {
                assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn test_move_to_same_position_is_noop() {
        let u = ids(3);
        let mut order = NoteOrder::from_sequence(u.clone());
        assert_eq!(order.move_to(&u[1], 1).unwrap(), (1, 1));
        assert_eq!(snapshot(&order), u);
    }

    #[test]
    fn test_move_rejects_bad_input() {
        let u = ids(3);
        let mut order = NoteOrder::from_sequence(u.clone());
        assert!(matches!(
            order.move_to(&u[0], 3),
            Err(DocketError::InvalidArgument(_))
        ));
        assert!(matches!(
            order.move_to(&Uuid::new_v4(), 0),
            Err(DocketError::NotFound(_))
        ));
        assert_eq!(snapshot(&order), u);
    }

    #[test]
    fn test_remove_compacts() {
        let u = ids(4);
        let mut order = NoteOrder::from_sequence(u.clone());
        assert_eq!(order.remove(&u[1]), Some(1));
        assert_eq!(snapshot(&order), vec![u[0], u[2], u[3]]);
        assert_eq!(order.position_of(&u[3]), Some(2));
        assert_eq!(order.remove(&u[1]), None);
        assert!(order.is_consistent());
    }

    #[test]
    fn test_encode_matches_pair_format() {
        let u = ids(2);
        let order = NoteOrder::from_sequence(u.clone());
        let raw = order.encode().unwrap();
        assert_eq!(raw, format!("[[0,\"{}\"],[1,\"{}\"]]", u[0], u[1]));
        assert_eq!(NoteOrder::decode(&raw).unwrap(), u);
    }

    #[test]
    fn test_decode_sorts_by_position_and_drops_bad_uuids() {
        let u = ids(2);
        let raw = format!("[[5,\"{}\"],[1,\"not-a-uuid\"],[2,\"{}\"]]", u[0], u[1]);
        assert_eq!(NoteOrder::decode(&raw).unwrap(), vec![u[1], u[0]]);
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        assert!(matches!(
            NoteOrder::decode("{\"order\": 3"),
            Err(DocketError::CorruptOrderRecord(_))
        ));
    }

    #[test]
    fn test_random_walk_stays_consistent() {
        let u = ids(12);
        let mut order = NoteOrder::from_sequence(u.clone());
        // deterministic pseudo-random walk of moves and removals
        let mut seed: usize = 7;
        for step in 0..200 {
            seed = (seed * 31 + 11) % 1009;
            if order.is_empty() {
                break;
            }
            let pick = order.uuid_at(seed % order.len()).unwrap();
            if step % 17 == 16 {
                order.remove(&pick);
            } else {
                let target = (seed / 3) % order.len();
                order.move_to(&pick, target).unwrap();
                assert_eq!(order.position_of(&pick), Some(target));
            }
            assert!(order.is_consistent());
        }
    }
}
