//! SFZ instrument generation from directories of named samples.
//!
//! This crate turns a TOML instrument description into an SFZ file:
//! - Layer directories are scanned and every file name is parsed into a
//!   note, a dynamic level and a round-robin index
//! - Samples are optionally analyzed for onset and loudness
//! - Velocity and key ranges are derived from what was found
//! - The instrument is rendered as SFZ text
//!
//! # Architecture
//!
//! Each phase runs to completion before the next one starts:
//! [`scanner`] and [`tokenizer`] fill every layer's [`registry::Registry`],
//! [`analysis`] updates the stored records, then [`partition`] and [`emit`]
//! read them to produce the output.
//!
//! # Example
//!
//! ```ignore
//! use sfzgen::{generate, ConfigDocument, GenerateOptions};
//!
//! let doc = ConfigDocument::load("piano.toml")?;
//! let sfz = generate(&doc, &GenerateOptions::default())?;
//! std::fs::write("Piano.sfz", sfz)?;
//! ```

pub mod analysis;
pub mod config;
pub mod emit;
pub mod error;
pub mod layer;
pub mod partition;
pub mod path_utils;
pub mod registry;
pub mod scanner;
pub mod sfz;
pub mod tokenizer;

pub use config::{create_base_file, ConfigDocument, InstrumentConfig, LayerConfig, FORMAT_HELP};
pub use error::{Error, Result};
pub use layer::{resolve_layers, Defaults, Layer, Overrides};
pub use registry::{Registry, SampleRecord};

use emit::{render_instrument, Decoration, EmitOptions};
use std::path::{Path, PathBuf};

/// Options of one generator run
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Command-line overrides of the description
    pub overrides: Overrides,
    /// Include release layers
    pub releases: bool,
    /// Write header comments
    pub decorate: bool,
    /// Directory the SFZ file will be written to
    pub output_dir: PathBuf,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            overrides: Overrides::default(),
            releases: true,
            decorate: true,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Path of the SFZ file for an output name
pub fn output_path(output_dir: &Path, output_name: &str) -> PathBuf {
    output_dir.join(format!("{}.sfz", output_name))
}

/// Run every phase and return the SFZ text.
///
/// A layer whose directory can't be read is logged and left empty.
pub fn generate(doc: &ConfigDocument, options: &GenerateOptions) -> Result<String> {
    let configs = doc.layer_configs()?;
    let (defaults, mut layers) = resolve_layers(&doc.config, &configs, &options.overrides)?;

    for layer in layers.iter_mut() {
        match scanner::scan_layer(layer, &defaults) {
            Ok(accepted) => log::debug!(
                "Layer '{}': {} files accepted, {} samples stored",
                layer.name,
                accepted,
                layer.registry.len()
            ),
            Err(e) => log::error!("{}", e),
        }
    }

    analysis::analyze_layers(&mut layers);

    let settings = if options.decorate {
        Some(doc.settings_dump()?)
    } else {
        None
    };
    let emit_options = EmitOptions {
        releases: options.releases,
        output_dir: &options.output_dir,
        decoration: settings.as_deref().map(|settings| Decoration {
            settings,
            comment: doc.config.comment.as_ref(),
        }),
    };

    render_instrument(&defaults, &layers, &emit_options)
}
