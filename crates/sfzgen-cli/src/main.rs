//! sfzgen - SFZ instrument generator
//!
//! Builds an SFZ file from a TOML instrument description and directories of
//! samples named after their note, dynamic and round robin.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use sfzgen::{
    config::{create_base_file, FORMAT_HELP},
    generate, output_path, ConfigDocument, GenerateOptions, Overrides,
};

#[derive(Parser, Debug)]
#[command(name = "sfzgen")]
#[command(author, version, about = "Create SFZ instruments from samples", long_about = None)]
struct Cli {
    /// Instrument description (TOML), or the base name with --create-base
    #[arg(required_unless_present = "help_format")]
    source: Option<String>,

    /// Write the SFZ to stdout instead of a file
    #[arg(short = 'x', long)]
    stdout: bool,

    /// Leave out all knobs
    #[arg(short = 'k', long)]
    no_knobs: bool,

    /// Log every processed file
    #[arg(short, long)]
    verbose: bool,

    /// Don't decorate the SFZ with comments
    #[arg(short = 'e', long)]
    no_decor: bool,

    /// Output file name override (without .sfz)
    #[arg(short, long)]
    out: Option<String>,

    /// Output directory override
    #[arg(short = 'd', long)]
    outdir: Option<PathBuf>,

    /// Disable key crossfades
    #[arg(short = 'c', long)]
    no_crossfade: bool,

    /// Ignore release samples
    #[arg(short = 'r', long)]
    no_releases: bool,

    /// Create a minimal description named after SOURCE and exit
    #[arg(short = 'b', long)]
    create_base: bool,

    /// Print the description format and exit
    #[arg(short = 'y', long)]
    help_format: bool,

    /// Don't analyze sample audio
    #[arg(short, long)]
    force: bool,
}

impl Cli {
    fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            overrides: Overrides {
                no_knobs: self.no_knobs,
                no_crossfade: self.no_crossfade,
                force: self.force,
            },
            releases: !self.no_releases,
            decorate: !self.no_decor,
            output_dir: self.outdir.clone().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if cli.help_format {
        println!("{}", FORMAT_HELP);
        return Ok(());
    }

    let source = cli.source.as_deref().context("No source file given")?;

    if cli.create_base {
        let path = create_base_file(source)
            .with_context(|| format!("Failed to create {}.toml", source))?;
        println!("Created {}", path.display());
        return Ok(());
    }

    let doc = ConfigDocument::load(source)
        .with_context(|| format!("Failed to open source file {}", source))?;
    let output_name = doc.output_name(cli.out.as_deref())?;
    let options = cli.generate_options();

    let sfz = generate(&doc, &options).context("Failed to generate instrument")?;

    if cli.stdout {
        io::stdout()
            .lock()
            .write_all(sfz.as_bytes())
            .context("Failed to write to stdout")?;
        return Ok(());
    }

    let path = output_path(&options.output_dir, &output_name);
    fs::write(&path, sfz).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
