//! File name tokenizer and classifier
//!
//! A sample's file name (extension stripped, substitutions applied) is split
//! into tokens. Each token is classified on its own:
//!
//! | token | meaning | example |
//! |---|---|---|
//! | letter, optional `#`/`b`, octave | note | `c3`, `f#-1`, `bb2` |
//! | `p+`, `mp`, `mf`, `f+`, `v12`, `vl3`, `l2` | dynamic | `pp` = -2, `mf` = 1, `fff` = 4 |
//! | digits only | numbered key | `61` |
//! | `rr` + digits | round robin | `rr2` |
//!
//! Later tokens of the same kind overwrite earlier ones.

use crate::layer::{Defaults, Layer};
use crate::registry::SampleRecord;
use regex::Regex;
use std::sync::LazyLock;

/// Key used for every sample of a `onekey` layer
pub const ONEKEY_KEY: i32 = 60;

static NOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-g])([#b])?(-?\d+)$").expect("valid note regex"));
static DYNAMIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:p+|mp|mf|f+|vl?\d+|l\d+)$").expect("valid dynamic regex")
});
static INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid index regex"));
static ROUND_ROBIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^rr(\d+)$").expect("valid round robin regex"));
static TRAILING_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+$").expect("valid digits regex"));

/// What a single token means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Note name, as a key index before octave/transpose
    Note(i32),
    /// Dynamic level
    Dynamic(i32),
    /// Numbered key, as a key index before octave/transpose
    Index(i32),
    /// Round-robin index
    RoundRobin(u32),
    Unrecognized,
}

/// How plain numbers turn into keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMapping {
    pub stride: i32,
    pub index_offset: i32,
}

impl Default for IndexMapping {
    fn default() -> Self {
        Self {
            stride: 1,
            index_offset: 0,
        }
    }
}

type Classifier = fn(&str, IndexMapping) -> Option<Token>;

/// Tried in order; the first that matches decides.
const CLASSIFIERS: [Classifier; 4] = [
    classify_note,
    classify_dynamic,
    classify_index,
    classify_round_robin,
];

/// Classify a lower-cased token
pub fn classify(token: &str, mapping: IndexMapping) -> Token {
    CLASSIFIERS
        .iter()
        .find_map(|classifier| classifier(token, mapping))
        .unwrap_or(Token::Unrecognized)
}

/// Semitones above C
pub fn pitch_class(letter: char) -> Option<i32> {
    match letter {
        'c' => Some(0),
        'd' => Some(2),
        'e' => Some(4),
        'f' => Some(5),
        'g' => Some(7),
        'a' => Some(9),
        'b' => Some(11),
        _ => None,
    }
}

/// Key index of a note token such as `c#3`
pub fn note_key(token: &str) -> Option<i32> {
    let caps = NOTE_RE.captures(token)?;
    let letter = caps.get(1)?.as_str().chars().next()?;
    let mut key = pitch_class(letter)?;
    match caps.get(2).map(|m| m.as_str()) {
        Some("#") => key += 1,
        Some("b") => key -= 1,
        _ => {}
    }
    let octave: i32 = caps.get(3)?.as_str().parse().ok()?;
    octave.checked_mul(12)?.checked_add(key)
}

/// Dynamic level of a token such as `pp` or `v3`
pub fn dynamic_level(token: &str) -> Option<i32> {
    if !DYNAMIC_RE.is_match(token) {
        return None;
    }
    if token.starts_with('p') {
        return Some(-(token.len() as i32));
    }
    match token {
        "mp" => Some(0),
        "mf" => Some(1),
        t if t.starts_with('f') => Some(t.len() as i32 + 1),
        t => TRAILING_DIGITS_RE.find(t)?.as_str().parse().ok(),
    }
}

fn classify_note(token: &str, _: IndexMapping) -> Option<Token> {
    note_key(token).map(Token::Note)
}

fn classify_dynamic(token: &str, _: IndexMapping) -> Option<Token> {
    dynamic_level(token).map(Token::Dynamic)
}

fn classify_index(token: &str, mapping: IndexMapping) -> Option<Token> {
    if !INDEX_RE.is_match(token) {
        return None;
    }
    let value: i32 = token.parse().ok()?;
    value
        .checked_mul(mapping.stride)?
        .checked_sub(mapping.index_offset)
        .map(Token::Index)
}

fn classify_round_robin(token: &str, _: IndexMapping) -> Option<Token> {
    let caps = ROUND_ROBIN_RE.captures(token)?;
    caps.get(1)?.as_str().parse().ok().map(Token::RoundRobin)
}

/// Everything read from one file name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsedName {
    /// Key from the last note or number token
    pub key: Option<i32>,
    pub dynamic: i32,
    pub round_robin: u32,
}

/// Split a prepared file name and fold its tokens.
///
/// Each token is lower-cased, then replaced through the global map and
/// then through the layer map.
pub fn parse_name(layer: &Layer, defaults: &Defaults, name: &str) -> ParsedName {
    let mapping = IndexMapping {
        stride: layer.stride,
        index_offset: layer.index_offset,
    };

    let mut parsed = ParsedName::default();
    for chunk in layer.split.split(name) {
        let mut token = chunk.to_lowercase();
        if let Some(mapped) = defaults.map.get(&token) {
            token = mapped.clone();
        }
        if let Some(mapped) = layer.map.get(&token) {
            token = mapped.clone();
        }

        match classify(&token, mapping) {
            Token::Note(key) | Token::Index(key) => parsed.key = Some(key),
            Token::Dynamic(level) => parsed.dynamic = level,
            Token::RoundRobin(rr) => parsed.round_robin = rr,
            Token::Unrecognized => {}
        }
    }
    parsed
}

/// Where a file ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Accepted {
        dynamic: i32,
        key: i32,
        round_robin: u32,
    },
    /// No note or number, and the layer is neither `onekey` nor `unpitched`
    Unknown,
    /// Octave/transpose pushed the key below zero
    NegativeIndex(i32),
    /// Octave/transpose pushed the key outside the `i32` range
    KeyOutOfRange(i32),
}

/// Decide the registry slot for a parsed name
pub fn place(layer: &Layer, parsed: ParsedName) -> Placement {
    let ParsedName {
        key,
        dynamic,
        round_robin,
    } = parsed;

    let key = match key {
        Some(key) => {
            let shifted = layer
                .octave
                .checked_mul(12)
                .and_then(|octave| octave.checked_add(layer.transpose))
                .and_then(|offset| key.checked_add(offset));
            let Some(key) = shifted else {
                return Placement::KeyOutOfRange(key);
            };
            if key < 0 {
                return Placement::NegativeIndex(key);
            }
            key
        }
        None if layer.onekey => ONEKEY_KEY,
        None if layer.unpitched => layer.registry.key_count(dynamic) as i32,
        None => return Placement::Unknown,
    };

    Placement::Accepted {
        dynamic,
        key,
        round_robin,
    }
}

/// Classify one file and store it in the layer's registry when accepted.
///
/// `filename` is the name on disk, `name` the prepared name to tokenize.
pub fn classify_file(
    layer: &mut Layer,
    defaults: &Defaults,
    filename: &str,
    name: &str,
) -> Placement {
    let placement = place(layer, parse_name(layer, defaults, name));

    match placement {
        Placement::Accepted {
            dynamic,
            key,
            round_robin,
        } => {
            log::info!("{}", filename);
            if let Some(old) =
                layer
                    .registry
                    .insert(dynamic, key, round_robin, SampleRecord::new(filename))
            {
                log::debug!("{} replaces {}", filename, old.filename);
            }
        }
        Placement::Unknown => log::info!("Unknown note: {}", filename),
        Placement::NegativeIndex(_) => log::info!("Negative index: {}", filename),
        Placement::KeyOutOfRange(_) => log::info!("Key out of range: {}", filename),
    }

    placement
}
