//! Musical key handling on the open-key wheel.
//!
//! Keys are stored as open-key codes: a wheel position `1..=12` followed by
//! `d` (major) or `m` (minor).  `1d` is C major, `1m` is A minor; each step
//! clockwise is a fifth up.

use regex::Regex;
use std::sync::LazyLock;

/// Placeholder for a key that could not be mapped.
pub const UNKNOWN_KEY: &str = "?";

/// Distance reported when either key is unknown.
pub const UNKNOWN_DISTANCE: i32 = -1;

/// Distance reported for keys that should not be mixed.
pub const INCOMPATIBLE: i32 = 12;

static OPEN_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,2}[dm]$").expect("static regex"));

/// Canonical names, one per wheel slot.
const WHEEL: [(&str, &str); 24] = [
    ("1d", "C"),
    ("2d", "G"),
    ("3d", "D"),
    ("4d", "A"),
    ("5d", "E"),
    ("6d", "B"),
    ("7d", "F#"),
    ("8d", "Db"),
    ("9d", "Ab"),
    ("10d", "Eb"),
    ("11d", "Bb"),
    ("12d", "F"),
    ("1m", "Am"),
    ("2m", "Em"),
    ("3m", "Bm"),
    ("4m", "F#m"),
    ("5m", "C#m"),
    ("6m", "G#m"),
    ("7m", "D#m"),
    ("8m", "Bbm"),
    ("9m", "Fm"),
    ("10m", "Cm"),
    ("11m", "Gm"),
    ("12m", "Dm"),
];

/// Enharmonic spellings accepted on input.
const ALIASES: [(&str, &str); 10] = [
    ("7d", "Gb"),
    ("8d", "C#"),
    ("9d", "G#"),
    ("10d", "D#"),
    ("11d", "A#"),
    ("4m", "Gbm"),
    ("5m", "Dbm"),
    ("6m", "Abm"),
    ("7m", "Ebm"),
    ("8m", "A#m"),
];

/// A raw tag key mapped to both notations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedKey {
    pub open_key: String,
    pub musical_key: String,
}

impl NormalizedKey {
    pub fn unknown() -> Self {
        Self {
            open_key: UNKNOWN_KEY.to_string(),
            musical_key: UNKNOWN_KEY.to_string(),
        }
    }

    /// `"<open> / <musical>"`, as shown in the Key column.
    pub fn display(&self) -> String {
        format!("{} / {}", self.open_key, self.musical_key)
    }
}

fn musical_name(open_key: &str) -> Option<&'static str> {
    WHEEL
        .iter()
        .find(|(code, _)| *code == open_key)
        .map(|(_, name)| *name)
}

fn open_key_for(name: &str) -> Option<&'static str> {
    WHEEL
        .iter()
        .chain(ALIASES.iter())
        .find(|(_, n)| *n == name)
        .map(|(code, _)| *code)
}

/// Map a raw tag value (`"Am"`, `"F#min"`, `"Cmaj"`, `"8d"`) to both
/// notations.  Anything unmappable becomes `"?"` on both sides.
pub fn normalize_key(raw: Option<&str>) -> NormalizedKey {
    let raw = match raw.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return NormalizedKey::unknown(),
    };

    if OPEN_KEY_RE.is_match(raw) {
        return NormalizedKey {
            open_key: raw.to_string(),
            musical_key: musical_name(raw).unwrap_or(UNKNOWN_KEY).to_string(),
        };
    }

    let name = raw.strip_suffix("maj").unwrap_or(raw).replace("min", "m");
    match open_key_for(&name) {
        Some(code) => NormalizedKey {
            open_key: code.to_string(),
            musical_key: name,
        },
        None => NormalizedKey::unknown(),
    }
}

fn parse_open_key(key: &str) -> Option<(i32, char)> {
    let mode = key.chars().last().filter(|c| *c == 'd' || *c == 'm')?;
    let number = key[..key.len() - 1].parse::<i32>().ok()?;
    Some((number, mode))
}

/// Harmonic mixing distance between two open-key codes.
///
/// | result | meaning                                  |
/// |--------|------------------------------------------|
/// | `-1`   | either key unknown                       |
/// | `0`    | same key                                 |
/// | `1`    | neighbour on the wheel                   |
/// | `2`    | opposite side of the wheel               |
/// | `3`    | relative major/minor                     |
/// | `12`   | incompatible                             |
///
/// Equality is checked on the literal strings first, so `"?"` against `"?"`
/// is `0`.
pub fn key_distance(from: &str, to: &str) -> i32 {
    if from == to {
        return 0;
    }

    let (Some((from_num, from_mode)), Some((to_num, to_mode))) =
        (parse_open_key(from), parse_open_key(to))
    else {
        return UNKNOWN_DISTANCE;
    };

    if from_mode != to_mode {
        return if from_num == to_num { 3 } else { INCOMPATIBLE };
    }

    let mut d = (12 + from_num - to_num).rem_euclid(12);
    if d == 6 {
        return 2;
    }
    if d > 6 {
        d = 12 - d;
    }
    if d <= 1 {
        d
    } else {
        INCOMPATIBLE
    }
}
