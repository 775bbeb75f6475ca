use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of one playback slot on the host.
pub type DeckId = u32;

/// One displayed column.  The wire label is what the UI peer shows as header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    Artist,
    Title,
    Genre,
    Duration,
    #[serde(rename = "BPM")]
    Bpm,
    Key,
    KeyDistance,
}

impl Column {
    /// Every column, in row order.
    pub const ALL: [Column; 7] = [
        Column::Artist,
        Column::Title,
        Column::Genre,
        Column::Duration,
        Column::Bpm,
        Column::Key,
        Column::KeyDistance,
    ];
}

/// A single table cell.  Strings for text columns, numbers for BPM and
/// key distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}


/// One row, one cell per entry of `Snapshot::cols`.
pub type Row = Vec<Cell>;

/// Full browser state, sent to the UI peer after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Cursor position inside `rows`.
    pub sel_ix: usize,
    pub cols: Vec<Column>,
    /// The filtered view, in catalog order.
    pub rows: Vec<Row>,
    /// One entry per occupied deck.  JSON object keys are the deck ids.
    #[serde(default)]
    pub playing: BTreeMap<DeckId, Row>,
    pub bpm_filter: bool,
    pub bpm_percent: f64,
    pub key_filter: bool,
}

impl Snapshot {
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

/// Filter toggles sent by the UI peer.  Absent fields mean "no change".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm_filter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_filter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm_percent: Option<f64>,
}

impl FilterCommand {
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes one datagram.  Unknown fields are ignored.
    pub fn decode(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }

    pub fn is_empty(&self) -> bool {
        self.bpm_filter.is_none() && self.key_filter.is_none() && self.bpm_percent.is_none()
    }
}

/// Teardown notice; the peer exits when it receives it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quit {
    pub quit: bool,
}

impl Quit {
    pub fn encode() -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&Quit { quit: true })
    }
}

/// Anything the service sends to the UI peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UiMessage {
    Quit(Quit),
    Snapshot(Snapshot),
}

impl UiMessage {
    // Decoded by hand: untagged buffering can't read the numeric keys of
    // `Snapshot::playing`.
    pub fn decode(data: &[u8]) -> serde_json::Result<Self> {
        if let Ok(quit) = serde_json::from_slice::<Quit>(data) {
            return Ok(UiMessage::Quit(quit));
        }
        Snapshot::decode(data).map(UiMessage::Snapshot)
    }
}
