//! Instrument description files
//!
//! An instrument is described by a TOML document with global settings at the
//! top level and one table per layer:
//!
//! ```toml
//! output = "Piano"
//! exponent = 0.7
//! split = "[ _]"
//!
//! [layers.sustain]
//! source = "samples/sustain"
//!
//! [layers.release]
//! source = "samples/release"
//! volume = -6
//! ```
//!
//! The raw table is kept next to the typed view so the generated file can
//! carry a dump of the settings it was built from.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Instrument name used when the document has no `name` key
pub const DEFAULT_INSTRUMENT_NAME: &str = "Generated Instrument";

/// Layer name used for a top-level `[sustain]` table
pub const SUSTAIN_LAYER: &str = "sustain";

/// Settings accepted both at the top level and inside a layer table.
///
/// How a layer value combines with the top-level one is decided in
/// [`crate::layer::Layer::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommonSettings {
    /// Volume in dB
    pub volume: Option<f64>,
    /// Amplitude envelope attack in seconds
    pub attack: Option<f64>,
    /// Amplitude envelope release in seconds
    pub release: Option<f64>,
    /// Velocity curve exponent
    pub exponent: Option<f64>,
    /// Lowest key that gets a region
    pub min: Option<i32>,
    /// Highest key that gets a region
    pub max: Option<i32>,
    /// Octave shift applied to parsed keys
    #[serde(alias = "octaveOffset")]
    pub octave: Option<i32>,
    /// Semitone shift applied to parsed keys
    pub transpose: Option<i32>,
    /// Index of middle C for numerically named samples
    pub middle_c: Option<i32>,
    /// Key step between consecutive sample numbers
    pub stride: Option<i32>,
    /// Crossfade neighbouring regions across the keyboard
    pub crossfade: bool,
    /// Samples have no pitch; keys are assigned in scan order
    pub unpitched: bool,
    /// Loudest dynamic gets the lowest velocities
    pub invert_dynamics: bool,
    /// Regions cover only their own key
    pub exact: bool,
    /// Don't analyze sample audio
    #[serde(alias = "force")]
    pub skip_analysis: bool,
    /// Token replacements, matched case-insensitively
    pub map: HashMap<String, String>,
    /// Regex substitutions applied to the whole file name
    pub sub: Vec<Substitution>,
    /// Only file names matching this regex are used
    pub filter: Option<String>,
    /// Regex used to split file names into tokens
    pub split: Option<String>,
}

/// One `{ from, to }` entry of a `sub` list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Substitution {
    /// Regex to search for
    pub from: String,
    /// Replacement, `$1` style group references allowed
    pub to: String,
}

/// A layer table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayerConfig {
    /// Directory holding this layer's samples
    pub source: Option<PathBuf>,
    /// Samples play on note release
    pub is_release: bool,
    /// Release samples play even while the sustain pedal is down
    pub always_release: bool,
    /// Every sample lands on a single key
    pub onekey: bool,
    /// Add a volume knob for this layer
    pub knob: bool,
    /// Default knob position, 0-100
    pub knob_percent: Option<f64>,
    /// Settings shared with the top level
    #[serde(flatten)]
    pub settings: CommonSettings,
}

/// Typed view of the whole document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstrumentConfig {
    /// Output file name without the `.sfz` extension
    pub output: Option<String>,
    /// Instrument name shown in the header comment
    pub name: Option<String>,
    /// Arbitrary data copied into the header as comments
    pub comment: Option<toml::Table>,
    /// Add attack/release/release-volume knobs
    pub knobs: bool,
    /// Top-level settings
    #[serde(flatten)]
    pub settings: CommonSettings,
    /// Single implicit layer
    pub sustain: Option<LayerConfig>,
    /// Named layers, in document order
    pub layers: Option<toml::Table>,
}

/// A loaded instrument description
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    /// The document as written
    pub raw: toml::Table,
    /// The typed view of `raw`
    pub config: InstrumentConfig,
}

impl ConfigDocument {
    /// Read and parse a description file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse a description from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let raw: toml::Table = toml::from_str(content)?;
        let config: InstrumentConfig = toml::Value::Table(raw.clone()).try_into()?;
        Ok(Self { raw, config })
    }

    /// Output name, preferring an explicit override
    pub fn output_name(&self, override_name: Option<&str>) -> Result<String> {
        override_name
            .map(str::to_string)
            .or_else(|| self.config.output.clone())
            .ok_or_else(|| Error::Config("no output name: set `output` or pass --out".to_string()))
    }

    /// The layer tables in document order.
    ///
    /// A lone `[sustain]` table is used when there is no `[layers]` table.
    pub fn layer_configs(&self) -> Result<Vec<(String, LayerConfig)>> {
        match (&self.config.sustain, &self.config.layers) {
            (Some(sustain), None) => Ok(vec![(SUSTAIN_LAYER.to_string(), sustain.clone())]),
            (_, Some(layers)) => layers
                .iter()
                .map(|(name, value)| {
                    let layer: LayerConfig = value
                        .clone()
                        .try_into()
                        .map_err(|e| Error::Config(format!("layer '{}': {}", name, e)))?;
                    Ok((name.clone(), layer))
                })
                .collect(),
            (None, None) => Err(Error::Config(
                "no layers: add a [layers.NAME] or a [sustain] table".to_string(),
            )),
        }
    }

    /// The document re-serialized, for the generated file header
    pub fn settings_dump(&self) -> Result<String> {
        Ok(toml::to_string(&self.raw)?)
    }
}

/// Write a minimal description file named `<base>.toml`
pub fn create_base_file(base: &str) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{}.toml", base));

    let content = r#"# sfzgen instrument description
# Run `sfzgen --help-format` for every available key.

# Output file name without extension
output = "Instrument"

[layers.sustain]
# Directory containing the samples
source = ""

# Only file names matching this regex are used
filter = ""
"#;

    fs::write(&path, content)?;
    Ok(path)
}

/// Reference for the description file format
pub const FORMAT_HELP: &str = r#"
--------------------------------------------------------------------
Global settings (top level of the TOML file):

    output          output file name without extension
--------------------------------------------------------------------
    name            instrument name for the header comment
    comment         table of arbitrary values copied into the header

    volume          added to layer volumes (dB)
    attack          default 0.004 (s)
    release         default 0.3 (s)
    exponent        velocity curve exponent, default 0.6
    min             lowest key index; keys below are ignored
    max             highest key index; keys above are ignored
    octave          octave shift (alias: octaveOffset)
    transpose       semitone shift
    middleC         index of middle C for numbered samples, default 60
    stride          index step for numbered samples, default 1

    crossfade       fade regions in and out toward their key borders
    unpitched       don't track pitch; keys are assigned in scan order
    invertDynamics  reverse the order of dynamics
    exact           regions only cover their own key
    skipAnalysis    don't analyze audio (alias: force, same as --force)

    knobs           add Attack, Release and Release Volume controls

    [sustain]       a single layer, see layer settings
    # or
    [layers.NAME]   one table per layer; a layer named "release"
                    is a release layer

    filter, sub, map, split - see layer settings

--------------------------------------------------------------------
Layer settings ([layers.NAME]):

    source          path to the sample directory
--------------------------------------------------------------------
    # added to the global value
    volume, octave, transpose

    # replace the global value
    attack, release, min, max, middleC, stride, exponent, split

    # enabled if set here or globally
    crossfade, unpitched, invertDynamics, exact, skipAnalysis

    isRelease       release layer
    alwaysRelease   triggered on note up regardless of sustain pedal
    onekey          every sample on one key; no note name needed,
                    round robins allowed
    knob            add a volume knob labeled with the layer name
    knobPercent     default knob value, 0-100

    # applied in this order, each after its global counterpart
    filter          regex; only file names containing a match are used
    sub             list of { from = "regex", to = "text" } applied to
                    the whole file name ($1 refers to a group)
    split           regex splitting the file name into tokens,
                    default "[ _]"
    map             table of token replacements, case-insensitive

--------------------------------------------------------------------
"#;
