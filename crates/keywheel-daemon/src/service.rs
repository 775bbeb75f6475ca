//! The browser service: owns the catalog, the filter, the cursor, the
//! playing set and the channel to the UI, and keeps the UI in step with them.
//!
//! Every call that changes what the UI shows ends with exactly one snapshot
//! broadcast before it returns.

use keywheel_proto::config::Config;
use keywheel_proto::protocol::{Column, DeckId, Snapshot};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::catalog::{self, CatalogSource};
use crate::filter::FilterState;
use crate::ipc::{ChannelState, Clock, IpcChannel, IpcError, PeerLauncher};
use crate::playing::PlayingSet;
use crate::selection::SelectionCursor;
use crate::track::{TagReader, TrackRecord};

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("failed to open IPC channel: {0}")]
    Ipc(#[from] IpcError),
}

pub struct BrowserService<S: CatalogSource> {
    source: S,
    reader: Box<dyn TagReader>,
    catalog: Vec<TrackRecord>,
    filter: FilterState,
    cursor: SelectionCursor,
    playing: PlayingSet,
    channel: IpcChannel,
    /// Number of snapshots broadcast so far.
    rev: u64,
}

impl<S: CatalogSource> BrowserService<S> {
    /// Scan the library, open the channel, start the UI peer and send the
    /// first snapshot.
    pub fn new(
        source: S,
        reader: Box<dyn TagReader>,
        config: &Config,
        launcher: &mut dyn PeerLauncher,
        clock: &dyn Clock,
    ) -> Result<Self, BrowserError> {
        let mut catalog = catalog::scan(source.user_library(), &config.library, reader.as_ref());

        let mut playing = PlayingSet::new();
        playing.recompute_distances(&mut catalog);

        let filter = FilterState::from_config(&config.filter);
        let mut cursor = SelectionCursor::new();
        cursor.reapply(&catalog, &filter);

        let mut channel = IpcChannel::bind(&config.ipc)?;
        channel.start_peer(launcher, clock);

        let mut service = Self {
            source,
            reader,
            catalog,
            filter,
            cursor,
            playing,
            channel,
            rev: 0,
        };
        info!(
            "Browser ready: {} tracks, {} visible",
            service.catalog.len(),
            service.cursor.len()
        );
        service.broadcast();
        Ok(service)
    }

    // ── caller-facing operations ─────────────────────────────────────────────

    pub fn scroll_vertical(&mut self, toward_end: bool) {
        self.cursor.move_vertical(toward_end);
        self.broadcast();
    }

    /// Reserved for paging.
    pub fn scroll_horizontal(&mut self, toward_end: bool) {
        self.cursor.move_horizontal(toward_end);
    }

    /// Audition the selected record.  Does nothing on an empty view.
    pub fn preview(&mut self) {
        if let Some(handle) = self.selected().and_then(TrackRecord::handle).cloned() {
            self.source.preview_item(&handle);
        }
    }

    /// Load the selected record onto the host.  Does nothing on an empty view.
    pub fn load(&mut self) {
        if let Some(handle) = self.selected().and_then(TrackRecord::handle).cloned() {
            self.source.load_item(&handle);
        }
    }

    /// New tempo anchor for the BPM window.
    pub fn set_tempo(&mut self, bpm: f64) {
        debug!("Tempo reference -> {}", bpm);
        self.filter.bpm_reference = bpm;
        self.refilter();
        self.broadcast();
    }

    /// Replace the playing set and re-rank the catalog against its key.
    pub fn set_playing_tracks(&mut self, decks: BTreeMap<DeckId, PathBuf>) {
        self.playing.set_playing(decks, self.reader.as_ref());
        // distances first: the filter pass reads them
        self.playing.recompute_distances(&mut self.catalog);
        self.refilter();
        self.broadcast();
    }

    /// Handle at most one pending UI command.  Returns true when it changed
    /// the filter (and a snapshot went out).
    pub fn poll(&mut self) -> bool {
        let Some(cmd) = self.channel.poll_command() else {
            return false;
        };
        if !self.filter.apply(&cmd) {
            debug!("UI command {:?} changed nothing", cmd);
            return false;
        }
        debug!("Filter now {:?}", self.filter);
        self.refilter();
        self.broadcast();
        true
    }

    /// Tell the UI to quit and release the channel.
    pub fn disconnect(&mut self) {
        self.channel.close();
    }

    // ── state access ─────────────────────────────────────────────────────────

    pub fn catalog(&self) -> &[TrackRecord] {
        &self.catalog
    }

    /// The filtered view, in catalog order.
    pub fn filtered(&self) -> impl Iterator<Item = &TrackRecord> + '_ {
        self.cursor.view().iter().map(move |&ix| &self.catalog[ix])
    }

    pub fn selection(&self) -> &SelectionCursor {
        &self.cursor
    }

    pub fn selected(&self) -> Option<&TrackRecord> {
        self.cursor.selected().map(|ix| &self.catalog[ix])
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    pub fn playing(&self) -> &PlayingSet {
        &self.playing
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Snapshots broadcast since construction.
    pub fn revision(&self) -> u64 {
        self.rev
    }

    pub fn snapshot(&self) -> Snapshot {
        let cols = Column::ALL.to_vec();
        Snapshot {
            sel_ix: self.cursor.index(),
            rows: self.filtered().map(|r| r.row(&cols)).collect(),
            playing: self
                .playing
                .decks()
                .iter()
                .map(|(deck, r)| (*deck, r.row(&cols)))
                .collect(),
            bpm_filter: self.filter.bpm_filter_enabled,
            bpm_percent: self.filter.bpm_tolerance_percent,
            key_filter: self.filter.key_filter_enabled,
            cols,
        }
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn refilter(&mut self) {
        self.cursor.reapply(&self.catalog, &self.filter);
    }

    fn broadcast(&mut self) {
        self.rev += 1;
        let snapshot = self.snapshot();
        self.channel.send_snapshot(&snapshot);
    }
}
