//! Sample registry: dynamic level -> key -> round robin -> sample.

use std::collections::BTreeMap;
use std::fmt;

/// One sample file and what analysis found out about it
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// File name inside the layer's source directory
    pub filename: String,
    /// Frames of leading silence to skip
    pub offset: u64,
    /// Volume correction in dB
    pub volume: f64,
    /// Stereo position, -100 to 100. Always 0 for now.
    pub pan: f64,
}

impl SampleRecord {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            offset: 0,
            volume: 0.0,
            pan: 0.0,
        }
    }
}

impl fmt::Display for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "-> {} ^ {:.1}dB <> {} :: {}",
            self.offset, self.volume, self.pan, self.filename
        )
    }
}

/// Samples of one key, by round-robin index
pub type RoundRobins = BTreeMap<u32, SampleRecord>;

/// Keys of one dynamic level
pub type KeyMap = BTreeMap<i32, RoundRobins>;

/// All samples of one layer.
///
/// Every `(dynamic, key, round_robin)` triple holds at most one sample.
/// Keys are never negative; the tokenizer rejects those before insertion.
/// Iteration is always in ascending order at every level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    dynamics: BTreeMap<i32, KeyMap>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sample, returning the one it replaced at the same triple
    pub fn insert(
        &mut self,
        dynamic: i32,
        key: i32,
        round_robin: u32,
        record: SampleRecord,
    ) -> Option<SampleRecord> {
        self.dynamics
            .entry(dynamic)
            .or_default()
            .entry(key)
            .or_default()
            .insert(round_robin, record)
    }

    pub fn get(&self, dynamic: i32, key: i32, round_robin: u32) -> Option<&SampleRecord> {
        self.dynamics.get(&dynamic)?.get(&key)?.get(&round_robin)
    }

    /// Number of distinct keys stored for a dynamic level
    pub fn key_count(&self, dynamic: i32) -> usize {
        self.dynamics.get(&dynamic).map_or(0, BTreeMap::len)
    }

    /// Dynamic levels in ascending order
    pub fn dynamics(&self) -> impl DoubleEndedIterator<Item = (i32, &KeyMap)> + '_ {
        self.dynamics.iter().map(|(dynamic, keys)| (*dynamic, keys))
    }

    /// Total number of samples
    pub fn len(&self) -> usize {
        self.dynamics
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.dynamics.is_empty()
    }

    /// Every sample, for in-place updates
    pub fn samples_mut(&mut self) -> impl Iterator<Item = &mut SampleRecord> + '_ {
        self.dynamics
            .values_mut()
            .flat_map(BTreeMap::values_mut)
            .flat_map(BTreeMap::values_mut)
    }
}
