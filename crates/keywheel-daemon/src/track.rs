use keywheel_proto::protocol::{Cell, Column, Row};
use lofty::prelude::*;
use lofty::tag::ItemKey;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::keys::{self, NormalizedKey, UNKNOWN_DISTANCE};

const UNKNOWN: &str = "unknown";

/// Opaque host-side reference to a library item, handed back on
/// preview/load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemHandle(String);

impl ItemHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Tag fields as extracted from a file.  Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTags {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub duration_secs: Option<f64>,
    pub bpm: Option<f64>,
    pub initial_key: Option<String>,
    pub genre: Option<String>,
}

/// Tag extraction.  Failures come back as empty `RawTags`, never as errors.
pub trait TagReader {
    fn read_tags(&self, path: &Path) -> RawTags;
}

/// Reads tags with lofty.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> RawTags {
        let tagged = match lofty::read_from_path(path) {
            Ok(t) => t,
            Err(e) => {
                debug!("No tags for {:?}: {}", path, e);
                return RawTags::default();
            }
        };

        let mut tags = RawTags {
            duration_secs: Some(tagged.properties().duration().as_secs_f64()),
            ..Default::default()
        };

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            let text = |key: &ItemKey| {
                tag.get_string(key)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            tags.artist = text(&ItemKey::TrackArtist);
            tags.title = text(&ItemKey::TrackTitle);
            tags.genre = text(&ItemKey::Genre);
            tags.initial_key = text(&ItemKey::InitialKey);
            tags.bpm = text(&ItemKey::Bpm)
                .or_else(|| text(&ItemKey::IntegerBpm))
                .and_then(|v| parse_bpm(&v));
        }

        tags
    }
}

fn parse_bpm(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
}

/// `m:ss`, whole seconds.
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// One audio file with its tags and its distance to the playing key.
///
/// Everything except `key_distance` is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    path: PathBuf,
    artist: String,
    title: String,
    duration_secs: f64,
    bpm: Option<f64>,
    key: NormalizedKey,
    genre: String,
    key_distance: i32,
    handle: Option<ItemHandle>,
}

impl TrackRecord {
    /// Build a record from tags, filling in fallbacks for missing fields.
    pub fn from_tags(path: PathBuf, tags: RawTags, handle: Option<ItemHandle>) -> Self {
        let title = tags.title.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| UNKNOWN.to_string())
        });

        Self {
            artist: tags.artist.unwrap_or_else(|| UNKNOWN.to_string()),
            title,
            duration_secs: tags.duration_secs.filter(|d| *d >= 0.0).unwrap_or(0.0),
            bpm: tags.bpm,
            key: keys::normalize_key(tags.initial_key.as_deref()),
            genre: tags.genre.unwrap_or_else(|| UNKNOWN.to_string()),
            key_distance: UNKNOWN_DISTANCE,
            handle,
            path,
        }
    }

    /// Read `path` through `reader` and build a record from it.
    pub fn read(path: PathBuf, reader: &dyn TagReader, handle: Option<ItemHandle>) -> Self {
        let tags = reader.read_tags(&path);
        Self::from_tags(path, tags, handle)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn genre(&self) -> &str {
        &self.genre
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn bpm(&self) -> Option<f64> {
        self.bpm
    }

    /// Tempo used for filtering; untagged tracks count as `0.0`.
    pub fn bpm_value(&self) -> f64 {
        self.bpm.unwrap_or(0.0)
    }

    pub fn open_key(&self) -> &str {
        &self.key.open_key
    }

    pub fn musical_key(&self) -> &str {
        &self.key.musical_key
    }

    pub fn key_distance(&self) -> i32 {
        self.key_distance
    }

    pub fn handle(&self) -> Option<&ItemHandle> {
        self.handle.as_ref()
    }

    /// Recompute the distance to `reference`, or mark it unknown when there
    /// is no reference.
    pub fn update_distance(&mut self, reference: Option<&str>) {
        self.key_distance = match reference {
            Some(reference) => keys::key_distance(reference, &self.key.open_key),
            None => UNKNOWN_DISTANCE,
        };
    }

    pub fn cell(&self, column: Column) -> Cell {
        match column {
            Column::Artist => Cell::Text(self.artist.clone()),
            Column::Title => Cell::Text(self.title.clone()),
            Column::Genre => Cell::Text(self.genre.clone()),
            Column::Duration => Cell::Text(format_duration(self.duration_secs)),
            Column::Bpm => match self.bpm {
                Some(bpm) => Cell::Number(bpm),
                None => Cell::Text("none".to_string()),
            },
            Column::Key => Cell::Text(self.key.display()),
            Column::KeyDistance => Cell::Int(i64::from(self.key_distance)),
        }
    }

    pub fn row(&self, columns: &[Column]) -> Row {
        columns.iter().map(|c| self.cell(*c)).collect()
    }
}
