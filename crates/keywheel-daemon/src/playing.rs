use keywheel_proto::protocol::DeckId;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use crate::track::{TagReader, TrackRecord};

/// Tracks currently loaded on the host's decks.
#[derive(Debug, Clone, Default)]
pub struct PlayingSet {
    decks: BTreeMap<DeckId, TrackRecord>,
}

impl PlayingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every deck.  Each file is read from disk afresh; the catalog
    /// scan is not consulted.
    ///
    /// Call `recompute_distances` before the next filter pass.
    pub fn set_playing(&mut self, decks: BTreeMap<DeckId, PathBuf>, reader: &dyn TagReader) {
        self.decks = decks
            .into_iter()
            .map(|(deck, path)| (deck, TrackRecord::read(path, reader, None)))
            .collect();
        debug!("Playing set now has {} decks", self.decks.len());
    }

    pub fn decks(&self) -> &BTreeMap<DeckId, TrackRecord> {
        &self.decks
    }

    /// Open key of the lowest-numbered deck.
    pub fn reference_key(&self) -> Option<&str> {
        self.decks.values().next().map(TrackRecord::open_key)
    }

    /// Recompute `key_distance` on every catalog and deck record against the
    /// current reference key.
    pub fn recompute_distances(&mut self, catalog: &mut [TrackRecord]) {
        let reference = self.reference_key().map(str::to_string);
        let reference = reference.as_deref();
        for record in catalog.iter_mut() {
            record.update_distance(reference);
        }
        for record in self.decks.values_mut() {
            record.update_distance(reference);
        }
    }
}
