//! Layer directory scanning
//!
//! Lists a layer's source directory, keeps audio files, applies the filters
//! and substitutions and hands every surviving name to the tokenizer.

use crate::error::{Error, Result};
use crate::layer::{Defaults, Layer};
use crate::tokenizer::{classify_file, Placement};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;

static AUDIO_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(?:wav|ogg|flac)$").expect("valid extension regex"));

/// The name without its audio extension, or `None` for non-audio files
pub fn strip_audio_extension(filename: &str) -> Option<&str> {
    AUDIO_EXTENSION
        .find(filename)
        .map(|m| &filename[..m.start()])
}

/// Global filter first, then the layer filter; both must match somewhere
pub fn passes_filters(layer: &Layer, defaults: &Defaults, name: &str) -> bool {
    defaults.filter.as_ref().map_or(true, |f| f.is_match(name))
        && layer.filter.as_ref().map_or(true, |f| f.is_match(name))
}

/// Apply the global substitutions, then the layer ones
pub fn prepare_name(layer: &Layer, defaults: &Defaults, name: &str) -> String {
    defaults
        .sub
        .iter()
        .chain(layer.sub.iter())
        .fold(name.to_string(), |name, rewrite| rewrite.apply(&name))
}

/// Classify a list of file names in the given order.
///
/// Returns the number of accepted files.
pub fn scan_entries<I>(layer: &mut Layer, defaults: &Defaults, filenames: I) -> usize
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut accepted = 0;
    for filename in filenames {
        let filename = filename.as_ref();
        let Some(stem) = strip_audio_extension(filename) else {
            continue;
        };
        if !passes_filters(layer, defaults, stem) {
            continue;
        }

        let name = prepare_name(layer, defaults, stem);
        if name != stem {
            log::info!("(Parsed: {})", name);
        }

        if let Placement::Accepted { .. } = classify_file(layer, defaults, filename, &name) {
            accepted += 1;
        }
    }
    accepted
}

/// Scan a layer's source directory (not recursive), in file name order
pub fn scan_layer(layer: &mut Layer, defaults: &Defaults) -> Result<usize> {
    let source_dir = |source| Error::SourceDir {
        path: layer.source.clone(),
        source,
    };

    let mut filenames = Vec::new();
    for entry in fs::read_dir(&layer.source).map_err(source_dir)? {
        let entry = entry.map_err(source_dir)?;
        match entry.file_name().into_string() {
            Ok(name) => filenames.push(name),
            Err(name) => log::warn!("Skipping non UTF-8 file name: {:?}", name),
        }
    }
    filenames.sort();

    let accepted = scan_entries(layer, defaults, &filenames);
    log::debug!(
        "Layer '{}': {} of {} files accepted",
        layer.name,
        accepted,
        filenames.len()
    );
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigDocument;
    use crate::layer::{resolve_layers, Overrides};
    use std::path::Path;

    fn setup(toml: &str) -> (Defaults, Layer) {
        let doc = ConfigDocument::parse(toml).unwrap();
        let layers = doc.layer_configs().unwrap();
        let (defaults, mut layers) =
            resolve_layers(&doc.config, &layers, &Overrides::default()).unwrap();
        (defaults, layers.remove(0))
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    #[test]
    fn test_strip_audio_extension() {
        assert_eq!(strip_audio_extension("c3.wav"), Some("c3"));
        assert_eq!(strip_audio_extension("C3_PP.WAV"), Some("C3_PP"));
        assert_eq!(strip_audio_extension("loop.flac"), Some("loop"));
        assert_eq!(strip_audio_extension("hit.Ogg"), Some("hit"));
        assert_eq!(strip_audio_extension("notes.txt"), None);
        assert_eq!(strip_audio_extension("wav"), None);
        assert_eq!(strip_audio_extension("c3.wav.bak"), None);
    }

    #[test]
    fn test_only_audio_files_scanned() {
        let (defaults, mut layer) = setup("[layers.main]\nsource = \"s\"");
        let accepted = scan_entries(
            &mut layer,
            &defaults,
            ["c3.wav", "readme.txt", "d3.aiff", "e3.FLAC"],
        );
        assert_eq!(accepted, 2);
        assert!(layer.registry.get(0, 36, 0).is_some());
        assert!(layer.registry.get(0, 40, 0).is_some());
    }

    #[test]
    fn test_filters_must_both_match() {
        let (defaults, mut layer) = setup(
            r#"
            filter = "piano"
            [layers.main]
            source = "s"
            filter = "soft"
            "#,
        );

        let accepted = scan_entries(
            &mut layer,
            &defaults,
            ["piano_soft_c3.wav", "piano_hard_d3.wav", "organ_soft_e3.wav"],
        );
        assert_eq!(accepted, 1);
        assert_eq!(layer.registry.get(0, 36, 0).unwrap().filename, "piano_soft_c3.wav");
    }

    #[test]
    fn test_filter_runs_before_substitution() {
        let (defaults, mut layer) = setup(
            r#"
            filter = "Soft"
            sub = [{ from = "Soft", to = "pp" }]
            [layers.main]
            source = "s"
            "#,
        );

        let accepted = scan_entries(&mut layer, &defaults, ["Soft_c3.wav"]);
        assert_eq!(accepted, 1);
        assert!(layer.registry.get(-2, 36, 0).is_some());
    }

    #[test]
    fn test_global_substitutions_before_layer_ones() {
        let (defaults, layer) = setup(
            r#"
            sub = [{ from = "Loud", to = "Medium" }]
            [layers.main]
            source = "s"
            sub = [{ from = "Medium", to = "mf" }, { from = "Note(\\d)", to = "c$1" }]
            "#,
        );

        assert_eq!(prepare_name(&layer, &defaults, "Loud_Note3"), "mf_c3");
    }

    #[test]
    fn test_substitution_replaces_every_match() {
        let (defaults, layer) = setup(
            r#"
            sub = [{ from = "-", to = "_" }]
            [layers.main]
            source = "s"
            "#,
        );

        assert_eq!(prepare_name(&layer, &defaults, "a-b-c"), "a_b_c");
    }

    #[test]
    fn test_scan_layer_sorted_last_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["b_c3.wav", "a_c3.wav", "notes.txt"]);

        let toml = format!(
            "[layers.main]\nsource = {:?}",
            dir.path().to_str().unwrap()
        );
        let (defaults, mut layer) = setup(&toml);

        assert_eq!(scan_layer(&mut layer, &defaults).unwrap(), 2);
        assert_eq!(layer.registry.len(), 1);
        assert_eq!(layer.registry.get(0, 36, 0).unwrap().filename, "b_c3.wav");
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let toml = format!("[layers.main]\nsource = {:?}", missing.to_str().unwrap());
        let (defaults, mut layer) = setup(&toml);

        let err = scan_layer(&mut layer, &defaults).unwrap_err();
        assert!(matches!(err, Error::SourceDir { .. }));
        assert!(err.to_string().contains("missing"));
        assert!(layer.registry.is_empty());
    }
}
