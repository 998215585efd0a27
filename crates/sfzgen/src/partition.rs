//! Velocity and key range computation
//!
//! Turns a layer's registry into the groups and regions the emitter writes.
//! Ranges are computed over every stored key; `min`/`max` only decide which
//! regions are kept afterwards, so excluded keys still shape their
//! neighbours' ranges.

use crate::layer::Layer;
use crate::registry::{RoundRobins, SampleRecord};

/// Inclusive velocity range; `None` means open-ended (0 or 127)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VelocityRange {
    pub low: Option<u8>,
    pub high: Option<u8>,
}

/// `floor((index / count)^exponent * 128)`, in `0..128` for `index < count`
pub fn velocity_boundary(index: usize, count: usize, exponent: f64) -> u8 {
    if count == 0 {
        return 0;
    }
    let fraction = index as f64 / count as f64;
    (fraction.powf(exponent) * 128.0).floor().clamp(0.0, 127.0) as u8
}

/// Lower velocity bound of every level, strictly increasing.
///
/// A steep or flat curve can floor two neighbouring boundaries to the same
/// value; such a boundary is pushed up (or, near 127, held down) so that
/// each level keeps at least one velocity. With more than 128 levels some
/// levels have to share a velocity.
fn velocity_boundaries(count: usize, exponent: f64) -> Vec<u8> {
    let mut boundaries: Vec<u8> = Vec::with_capacity(count);
    for i in 0..count {
        let raw = velocity_boundary(i, count, exponent);
        let boundary = match boundaries.last() {
            Some(&prev) => {
                let room = 128usize.saturating_sub(count - i);
                raw.max(prev.saturating_add(1)).min(room.max(usize::from(prev)) as u8)
            }
            None => raw,
        };
        boundaries.push(boundary);
    }
    boundaries
}

/// Velocity ranges for `count` dynamic levels in playing order
pub fn velocity_ranges(count: usize, exponent: f64) -> Vec<VelocityRange> {
    let boundaries = velocity_boundaries(count, exponent);
    (0..count)
        .map(|i| VelocityRange {
            low: (i != 0).then(|| boundaries[i]),
            high: boundaries
                .get(i + 1)
                .map(|&next| next.saturating_sub(1).max(boundaries[i])),
        })
        .collect()
}

/// Key crossfade zones of one region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyCrossfade {
    /// Fade in from the low bound to the center
    pub fade_in: Option<(i32, i32)>,
    /// Fade out from the center to the high bound
    pub fade_out: Option<(i32, i32)>,
}

/// Inclusive key range of one key's regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    /// The sample's own key
    pub center: i32,
    pub low: Option<i32>,
    pub high: Option<i32>,
    pub crossfade: Option<KeyCrossfade>,
}

impl KeyRange {
    /// Whether the region is written as a single `key=`
    pub fn is_fixed(&self, exact: bool) -> bool {
        exact || (self.low == Some(self.center) && self.high == Some(self.center))
    }
}

/// Key ranges for ascending, distinct keys.
///
/// The border between neighbours is the floored midpoint; the lower key ends
/// on it and the upper key starts right after. Crossfade never widens a
/// range: it fades in from the low bound up to the center and out from the
/// center up to the high bound.
pub fn key_ranges(keys: &[i32], crossfade: bool) -> Vec<KeyRange> {
    let borders: Vec<i32> = keys
        .windows(2)
        .map(|pair| ((i64::from(pair[0]) + i64::from(pair[1])).div_euclid(2)) as i32)
        .collect();

    keys.iter()
        .enumerate()
        .map(|(i, &center)| {
            let low = i.checked_sub(1).map(|p| borders[p] + 1);
            let high = borders.get(i).copied();

            KeyRange {
                center,
                low,
                high,
                crossfade: crossfade.then(|| KeyCrossfade {
                    fade_in: low.filter(|&l| l < center).map(|l| (l, center)),
                    fade_out: high.filter(|&h| h > center).map(|h| (center, h)),
                }),
            }
        })
        .collect()
}

/// Round-robin position of a region: 1-based position and sequence length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub position: usize,
    pub length: usize,
}

/// One `<region>` to write
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPlan<'a> {
    pub sample: &'a SampleRecord,
    pub keys: KeyRange,
    /// Only set when the key has more than one round robin
    pub sequence: Option<Sequence>,
}

/// One `<group>` to write: a dynamic level and its regions
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan<'a> {
    pub dynamic: i32,
    pub velocity: VelocityRange,
    pub regions: Vec<RegionPlan<'a>>,
}

fn round_robin_regions<'a>(keys: KeyRange, robins: &'a RoundRobins) -> impl Iterator<Item = RegionPlan<'a>> {
    let length = robins.len();
    robins.values().enumerate().map(move |(i, sample)| RegionPlan {
        sample,
        keys,
        sequence: (length > 1).then_some(Sequence {
            position: i + 1,
            length,
        }),
    })
}

/// Groups of a layer in playing order, softest dynamic first unless
/// `invertDynamics` is set
pub fn partition_layer(layer: &Layer) -> Vec<GroupPlan<'_>> {
    let mut dynamics: Vec<_> = layer.registry.dynamics().collect();
    if layer.invert_dynamics {
        dynamics.reverse();
    }

    let velocities = velocity_ranges(dynamics.len(), layer.exponent);

    dynamics
        .into_iter()
        .zip(velocities)
        .map(|((dynamic, key_map), velocity)| {
            let keys: Vec<i32> = key_map.keys().copied().collect();
            let regions = key_ranges(&keys, layer.crossfade)
                .into_iter()
                .zip(key_map.values())
                .filter(|(range, _)| layer.in_bounds(range.center))
                .flat_map(|(range, robins)| round_robin_regions(range, robins))
                .collect();

            GroupPlan {
                dynamic,
                velocity,
                regions,
            }
        })
        .collect()
}
