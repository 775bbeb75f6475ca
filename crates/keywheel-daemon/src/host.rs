//! Line commands for driving the browser from a terminal, standing in for
//! the host application's controller callbacks.

use keywheel_proto::protocol::DeckId;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::catalog::CatalogSource;
use crate::service::BrowserService;

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Up,
    Down,
    Left,
    Right,
    Preview,
    Load,
    Tempo(f64),
    /// Put a file on a deck.
    Deck(DeckId, PathBuf),
    Eject(DeckId),
    Quit,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` needs {1}")]
    MissingArgument(&'static str, &'static str),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
}

impl FromStr for HostCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Err(ParseError::Empty),
            "up" | "k" => Ok(Self::Up),
            "down" | "j" => Ok(Self::Down),
            "left" | "h" => Ok(Self::Left),
            "right" | "l" => Ok(Self::Right),
            "preview" | "p" => Ok(Self::Preview),
            "load" => Ok(Self::Load),
            "quit" | "q" => Ok(Self::Quit),
            "tempo" => {
                if rest.is_empty() {
                    return Err(ParseError::MissingArgument("tempo", "a BPM"));
                }
                rest.parse::<f64>()
                    .ok()
                    .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
                    .map(Self::Tempo)
                    .ok_or_else(|| ParseError::InvalidNumber(rest.to_string()))
            }
            "deck" => {
                let (id, path) = match rest.split_once(char::is_whitespace) {
                    Some((id, path)) if !path.trim().is_empty() => (id, path.trim()),
                    _ => return Err(ParseError::MissingArgument("deck", "a deck id and a path")),
                };
                Ok(Self::Deck(parse_deck(id)?, PathBuf::from(path)))
            }
            "eject" => {
                if rest.is_empty() {
                    return Err(ParseError::MissingArgument("eject", "a deck id"));
                }
                Ok(Self::Eject(parse_deck(rest)?))
            }
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

fn parse_deck(raw: &str) -> Result<DeckId, ParseError> {
    raw.parse()
        .map_err(|_| ParseError::InvalidNumber(raw.to_string()))
}

/// Read lines from `reader` on a plain OS thread and forward them.
///
/// Not `spawn_blocking`: a read parked on an open stdin would hold up runtime
/// shutdown.  A detached thread is simply abandoned when the process exits.
/// The receiver yields `None` once the reader hits EOF or fails.
pub fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Host input read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// The browser plus the deck assignments the host has reported so far.
pub struct HostSession<S: CatalogSource> {
    service: BrowserService<S>,
    decks: BTreeMap<DeckId, PathBuf>,
}

impl<S: CatalogSource> HostSession<S> {
    pub fn new(service: BrowserService<S>) -> Self {
        Self {
            service,
            decks: BTreeMap::new(),
        }
    }

    pub fn service_mut(&mut self) -> &mut BrowserService<S> {
        &mut self.service
    }

    /// Run one command.  Returns false once the session should end.
    pub fn handle(&mut self, cmd: HostCommand) -> bool {
        debug!("Host command: {:?}", cmd);
        match cmd {
            HostCommand::Up => self.service.scroll_vertical(false),
            HostCommand::Down => self.service.scroll_vertical(true),
            HostCommand::Left => self.service.scroll_horizontal(false),
            HostCommand::Right => self.service.scroll_horizontal(true),
            HostCommand::Preview => self.service.preview(),
            HostCommand::Load => self.service.load(),
            HostCommand::Tempo(bpm) => self.service.set_tempo(bpm),
            HostCommand::Deck(deck, path) => {
                self.decks.insert(deck, path);
                self.service.set_playing_tracks(self.decks.clone());
            }
            HostCommand::Eject(deck) => {
                if self.decks.remove(&deck).is_some() {
                    self.service.set_playing_tracks(self.decks.clone());
                }
            }
            HostCommand::Quit => {
                info!("Quit requested");
                return false;
            }
        }
        true
    }

    pub fn shutdown(mut self) {
        self.service.disconnect();
    }
}
