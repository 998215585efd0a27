//! Resolved settings
//!
//! [`Defaults`] is built once from the top level of the description file;
//! every [`Layer`] is then merged from its own table and the defaults. After
//! construction only a layer's [`Registry`] changes.

use crate::config::{CommonSettings, InstrumentConfig, LayerConfig, Substitution, DEFAULT_INSTRUMENT_NAME};
use crate::error::{Error, Result};
use crate::registry::Registry;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_ATTACK: f64 = 0.004;
pub const DEFAULT_RELEASE: f64 = 0.3;
pub const DEFAULT_EXPONENT: f64 = 0.6;

/// Key of middle C; `middleC` is stored as an offset from it
pub const MIDDLE_C: i32 = 60;

/// Splits on spaces and underscores
pub const DEFAULT_SPLIT: &str = "[ _]";

/// Layer name that implies `isRelease`
pub const RELEASE_LAYER: &str = "release";

/// Knob value when `knobPercent` is absent
pub const DEFAULT_KNOB_VALUE: u8 = 127;

/// Command-line switches that change how settings resolve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Drop every knob
    pub no_knobs: bool,
    /// Turn key crossfades off on every layer
    pub no_crossfade: bool,
    /// Skip audio analysis everywhere
    pub force: bool,
}

/// A compiled `sub` entry
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub pattern: Regex,
    pub replacement: String,
}

impl Rewrite {
    /// Replace every match in `name`
    pub fn apply(&self, name: &str) -> String {
        self.pattern.replace_all(name, self.replacement.as_str()).into_owned()
    }
}

/// Top-level settings every layer is resolved against
#[derive(Debug, Clone)]
pub struct Defaults {
    pub name: String,
    pub volume: f64,
    pub attack: f64,
    pub release: f64,
    pub exponent: f64,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub octave: i32,
    pub transpose: i32,
    /// `middleC - 60`
    pub index_offset: i32,
    pub stride: i32,
    pub crossfade: bool,
    pub unpitched: bool,
    pub invert_dynamics: bool,
    pub exact: bool,
    pub skip_analysis: bool,
    pub knobs: bool,
    pub map: HashMap<String, String>,
    pub sub: Vec<Rewrite>,
    pub filter: Option<Regex>,
    pub split: Regex,
}

impl Defaults {
    pub fn resolve(config: &InstrumentConfig, overrides: &Overrides) -> Result<Self> {
        let s = &config.settings;
        let exponent = s.exponent.unwrap_or(DEFAULT_EXPONENT);
        check_exponent(exponent)?;

        Ok(Self {
            name: config
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUMENT_NAME.to_string()),
            volume: s.volume.unwrap_or(0.0),
            attack: s.attack.unwrap_or(DEFAULT_ATTACK),
            release: s.release.unwrap_or(DEFAULT_RELEASE),
            exponent,
            min: s.min,
            max: s.max,
            octave: s.octave.unwrap_or(0),
            transpose: s.transpose.unwrap_or(0),
            index_offset: s.middle_c.map_or(Ok(0), middle_c_offset)?,
            stride: s.stride.unwrap_or(1),
            crossfade: s.crossfade && !overrides.no_crossfade,
            unpitched: s.unpitched,
            invert_dynamics: s.invert_dynamics,
            exact: s.exact,
            skip_analysis: s.skip_analysis || overrides.force,
            knobs: config.knobs && !overrides.no_knobs,
            map: lowercase_map(&s.map),
            sub: compile_rewrites(&s.sub)?,
            filter: s.filter.as_deref().map(compile_regex).transpose()?,
            split: compile_regex(s.split.as_deref().unwrap_or(DEFAULT_SPLIT))?,
        })
    }
}

/// One instrument layer: resolved settings plus the samples found for it
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub source: PathBuf,
    /// Group attack, only when the layer sets one
    pub attack: Option<f64>,
    /// Group release, only when the layer sets one
    pub release: Option<f64>,
    pub volume: f64,
    pub exponent: f64,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub octave: i32,
    pub transpose: i32,
    pub index_offset: i32,
    pub stride: i32,
    pub crossfade: bool,
    pub unpitched: bool,
    pub invert_dynamics: bool,
    pub exact: bool,
    pub skip_analysis: bool,
    pub is_release: bool,
    pub always_release: bool,
    pub onekey: bool,
    pub knob: bool,
    /// Default knob position, 0-127
    pub knob_value: u8,
    /// Applied after the global map
    pub map: HashMap<String, String>,
    /// Applied after the global substitutions
    pub sub: Vec<Rewrite>,
    /// Checked after the global filter
    pub filter: Option<Regex>,
    pub split: Regex,
    pub registry: Registry,
}

impl Layer {
    /// Merge a layer table with the defaults.
    ///
    /// | rule | fields |
    /// |---|---|
    /// | added to the default | volume, octave, transpose |
    /// | layer value replaces the default | attack, release, min, max, middleC, stride, exponent, split |
    /// | on if on in either | crossfade, unpitched, invertDynamics, exact, skipAnalysis |
    /// | layer-only, chained after the default | map, sub, filter |
    pub fn resolve(
        name: &str,
        config: &LayerConfig,
        defaults: &Defaults,
        overrides: &Overrides,
    ) -> Result<Self> {
        let s: &CommonSettings = &config.settings;
        let source = config
            .source
            .clone()
            .ok_or_else(|| Error::Config(format!("layer '{}' has no source", name)))?;

        let exponent = s.exponent.unwrap_or(defaults.exponent);
        check_exponent(exponent)?;

        let split = match s.split.as_deref() {
            Some(pattern) => compile_regex(pattern)?,
            None => defaults.split.clone(),
        };

        Ok(Self {
            name: name.to_string(),
            source,
            attack: s.attack,
            release: s.release,
            volume: s.volume.unwrap_or(0.0) + defaults.volume,
            exponent,
            min: s.min.or(defaults.min),
            max: s.max.or(defaults.max),
            octave: add_setting("octave", s.octave.unwrap_or(0), defaults.octave)?,
            transpose: add_setting("transpose", s.transpose.unwrap_or(0), defaults.transpose)?,
            index_offset: s.middle_c.map_or(Ok(defaults.index_offset), middle_c_offset)?,
            stride: s.stride.unwrap_or(defaults.stride),
            crossfade: (s.crossfade || defaults.crossfade) && !overrides.no_crossfade,
            unpitched: s.unpitched || defaults.unpitched,
            invert_dynamics: s.invert_dynamics || defaults.invert_dynamics,
            exact: s.exact || defaults.exact,
            skip_analysis: s.skip_analysis || defaults.skip_analysis,
            is_release: config.is_release || name == RELEASE_LAYER,
            always_release: config.always_release,
            onekey: config.onekey,
            knob: config.knob && !overrides.no_knobs,
            knob_value: config.knob_percent.map_or(DEFAULT_KNOB_VALUE, knob_value),
            map: lowercase_map(&s.map),
            sub: compile_rewrites(&s.sub)?,
            filter: s.filter.as_deref().map(compile_regex).transpose()?,
            split,
            registry: Registry::new(),
        })
    }

    /// Whether a key falls inside the layer's `min`/`max` bounds
    pub fn in_bounds(&self, key: i32) -> bool {
        self.min.map_or(true, |min| key >= min) && self.max.map_or(true, |max| key <= max)
    }
}

/// Resolve the defaults and every layer of a description
pub fn resolve_layers(
    config: &InstrumentConfig,
    layers: &[(String, LayerConfig)],
    overrides: &Overrides,
) -> Result<(Defaults, Vec<Layer>)> {
    let defaults = Defaults::resolve(config, overrides)?;
    let layers = layers
        .iter()
        .map(|(name, layer)| Layer::resolve(name, layer, &defaults, overrides))
        .collect::<Result<Vec<_>>>()?;
    Ok((defaults, layers))
}

/// Percent (0-100) to a controller value (0-127)
fn knob_value(percent: f64) -> u8 {
    (percent.clamp(0.0, 100.0) * 127.0 / 100.0).floor() as u8
}

fn check_exponent(exponent: f64) -> Result<()> {
    if exponent.is_finite() && exponent > 0.0 {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "exponent must be a positive number, got {}",
            exponent
        )))
    }
}

fn add_setting(key: &str, layer: i32, default: i32) -> Result<i32> {
    layer
        .checked_add(default)
        .ok_or_else(|| Error::Config(format!("{} out of range: {} + {}", key, layer, default)))
}

fn middle_c_offset(middle_c: i32) -> Result<i32> {
    middle_c
        .checked_sub(MIDDLE_C)
        .ok_or_else(|| Error::Config(format!("middleC out of range: {}", middle_c)))
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_rewrites(subs: &[Substitution]) -> Result<Vec<Rewrite>> {
    subs.iter()
        .map(|s| {
            Ok(Rewrite {
                pattern: compile_regex(&s.from)?,
                replacement: s.to.clone(),
            })
        })
        .collect()
}

fn lowercase_map(map: &HashMap<String, String>) -> HashMap<String, String> {
    map.iter()
        .map(|(from, to)| (from.to_lowercase(), to.to_lowercase()))
        .collect()
}
