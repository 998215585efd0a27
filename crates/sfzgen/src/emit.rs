//! SFZ text generation
//!
//! Output order:
//!
//! ```text
//! // Instrument: NAME            (decoration)
//! // Settings used: ...
//! <control>                      (knob labels and defaults, if any)
//! <global>                       (envelope defaults)
//! <group> <region> <region> ...  (per layer, per dynamic level)
//! ```
//!
//! Everything is rendered into one `String`; nothing is written until the
//! whole instrument is known to be valid.

use crate::error::Result;
use crate::layer::{Defaults, Layer};
use crate::partition::{partition_layer, RegionPlan, VelocityRange};
use crate::path_utils::sample_path;
use crate::sfz::{format_float, Section, SectionType};
use std::path::Path;

/// Controller for the global release time knob
pub const RELEASE_CC: u32 = 72;
/// Controller for the global attack time knob
pub const ATTACK_CC: u32 = 73;
/// Controller for the release sample volume knob
pub const RELEASE_VOLUME_CC: u32 = 205;
/// Controller of the first layer volume knob; layer `i` uses `301 + i`
pub const LAYER_KNOB_CC_BASE: u32 = 301;

/// Header comments
#[derive(Debug, Clone, Copy)]
pub struct Decoration<'a> {
    /// TOML dump of the description file
    pub settings: &'a str,
    /// The `comment` table, written as a tree
    pub comment: Option<&'a toml::Table>,
}

#[derive(Debug, Clone, Copy)]
pub struct EmitOptions<'a> {
    /// Write release layers and the release volume knob
    pub releases: bool,
    /// Directory the SFZ file goes to; sample paths are relative to it
    pub output_dir: &'a Path,
    /// `None` leaves out the header comments
    pub decoration: Option<Decoration<'a>>,
}

/// Controller used by the volume knob of the layer at `index`
pub fn layer_knob_cc(index: usize) -> u32 {
    LAYER_KNOB_CC_BASE + index as u32
}

/// `<control>` section; empty when no knob is enabled
pub fn control_section(defaults: &Defaults, layers: &[Layer], releases: bool) -> Section {
    let mut section = Section::new(SectionType::Control);

    if defaults.knobs {
        section.add_opcode(format!("label_cc{}", RELEASE_CC), "Release");
        section.add_opcode(format!("label_cc{}", ATTACK_CC), "Attack");
        section.add_opcode_with_comment(format!("set_cc{}", RELEASE_CC), 18, "Release = 128*.14 (14%)");
        section.add_opcode_with_comment(format!("set_cc{}", ATTACK_CC), 0, "Attack = 0%");
        if releases {
            section.add_opcode(format!("label_cc{}", RELEASE_VOLUME_CC), "Release Volume");
            section.add_opcode(format!("set_cc{}", RELEASE_VOLUME_CC), 60);
        }
    }

    for (i, layer) in layers.iter().enumerate().filter(|(_, l)| l.knob) {
        let cc = layer_knob_cc(i);
        section.add_opcode(format!("label_cc{}", cc), &layer.name);
        section.add_opcode(format!("set_cc{}", cc), layer.knob_value);
    }

    section
}

pub fn global_section(defaults: &Defaults) -> Section {
    let mut section = Section::new(SectionType::Global);
    section.add_opcode("ampeg_attack", format_float(defaults.attack));
    section.add_opcode("ampeg_release", format_float(defaults.release));

    if defaults.knobs {
        section.add_opcode_with_comment(format!("ampeg_release_oncc{}", RELEASE_CC), 6, "on Release");
        section.add_opcode_with_comment(format!("ampeg_attack_oncc{}", ATTACK_CC), 6, "on Attack");
    }
    section
}

/// `<group>` header of one dynamic level of the layer at `index`
pub fn group_section(defaults: &Defaults, layer: &Layer, index: usize, velocity: VelocityRange) -> Section {
    let mut section = Section::new(SectionType::Group);

    if let Some(attack) = layer.attack.filter(|a| *a > 0.0) {
        section.add_opcode("ampeg_attack", format_float(attack));
    }
    if let Some(release) = layer.release.filter(|r| *r > 0.0) {
        section.add_opcode("ampeg_release", format_float(release));
    }

    if layer.is_release {
        let trigger = if layer.always_release { "release_key" } else { "release" };
        section.add_opcode("trigger", trigger);
        if defaults.knobs {
            section.add_opcode(format!("gain_oncc{}", RELEASE_VOLUME_CC), 10);
        }
    }

    if layer.unpitched {
        section.add_opcode("pitch_keytrack", 0);
    }

    if let Some(low) = velocity.low {
        section.add_opcode("lovel", low);
    }
    if let Some(high) = velocity.high {
        section.add_opcode("hivel", high);
    }

    if layer.volume != 0.0 {
        section.add_opcode("volume", format_float(layer.volume));
    }

    if layer.knob {
        let cc = layer_knob_cc(index);
        section.add_opcode(format!("xfin_locc{}", cc), 1);
        section.add_opcode(format!("xfin_hicc{}", cc), 127);
    }

    section
}

pub fn region_section(layer: &Layer, region: &RegionPlan<'_>, output_dir: &Path) -> Result<Section> {
    let mut section = Section::new(SectionType::Region);
    let sample = region.sample;
    let keys = &region.keys;

    if let Some(seq) = region.sequence {
        section.add_opcode("seq_length", seq.length);
        section.add_opcode("seq_position", seq.position);
    }

    section.add_opcode("sample", sample_path(&layer.source, &sample.filename, output_dir)?);

    if keys.is_fixed(layer.exact) {
        section.add_opcode("key", keys.center);
    } else {
        section.add_opcode("pitch_keycenter", keys.center);
        if let Some(low) = keys.low {
            section.add_opcode("lokey", low);
        }
        if let Some(high) = keys.high {
            section.add_opcode("hikey", high);
        }
    }

    if let Some(crossfade) = keys.crossfade.filter(|_| !layer.exact) {
        if let Some((low, high)) = crossfade.fade_in {
            section.add_opcode("xfin_lokey", low);
            section.add_opcode("xfin_hikey", high);
        }
        if let Some((low, high)) = crossfade.fade_out {
            section.add_opcode("xfout_lokey", low);
            section.add_opcode("xfout_hikey", high);
        }
    }

    if sample.offset > 0 {
        section.add_opcode("offset", sample.offset);
    }
    if sample.pan != 0.0 {
        section.add_opcode("pan", format_float(sample.pan));
    }
    if sample.volume != 0.0 {
        section.add_opcode("volume", format_float(sample.volume + layer.volume));
    }

    Ok(section)
}

fn push_comment_tree(out: &mut String, table: &toml::Table) {
    for (key, value) in table {
        out.push_str(&format!("// {}: \n", key));
        match value {
            toml::Value::Table(nested) => push_comment_tree(out, nested),
            toml::Value::String(s) => out.push_str(&format!("// - {}\n", s)),
            other => out.push_str(&format!("// - {}\n", other)),
        }
    }
    out.push('\n');
}

fn push_decoration(out: &mut String, name: &str, decoration: &Decoration<'_>) {
    out.push_str(&format!("// Instrument: {}\n\n", name));
    out.push_str("// Settings used:\n");
    for line in decoration.settings.lines() {
        out.push_str(format!("// {}", line).trim_end());
        out.push('\n');
    }
    out.push('\n');

    if let Some(comment) = decoration.comment.filter(|c| !c.is_empty()) {
        push_comment_tree(out, comment);
    }
}

/// Render the whole instrument
pub fn render_instrument(defaults: &Defaults, layers: &[Layer], options: &EmitOptions<'_>) -> Result<String> {
    let mut out = String::new();

    if let Some(decoration) = &options.decoration {
        push_decoration(&mut out, &defaults.name, decoration);
    }

    let control = control_section(defaults, layers, options.releases);
    if !control.is_empty() {
        out.push_str(&control.to_string());
    }
    out.push_str(&global_section(defaults).to_string());

    for (index, layer) in layers.iter().enumerate() {
        if layer.is_release && !options.releases {
            continue;
        }

        let groups = partition_layer(layer);
        log::debug!("Layer '{}': {} groups", layer.name, groups.len());
        for group in &groups {
            out.push_str(&group_section(defaults, layer, index, group.velocity).to_string());
            for region in &group.regions {
                out.push_str(&region_section(layer, region, options.output_dir)?.to_string());
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigDocument;
    use crate::layer::{resolve_layers, Overrides};
    use crate::registry::SampleRecord;

    fn resolve(toml: &str) -> (Defaults, Vec<Layer>) {
        let doc = ConfigDocument::parse(toml).unwrap();
        let layers = doc.layer_configs().unwrap();
        resolve_layers(&doc.config, &layers, &Overrides::default()).unwrap()
    }

    fn options() -> EmitOptions<'static> {
        EmitOptions {
            releases: true,
            output_dir: Path::new("."),
            decoration: None,
        }
    }

    fn add(layer: &mut Layer, dynamic: i32, key: i32, rr: u32, filename: &str) {
        layer.registry.insert(dynamic, key, rr, SampleRecord::new(filename));
    }

    #[test]
    fn test_minimal_instrument() {
        let (defaults, mut layers) = resolve("[layers.main]\nsource = \"samples\"");
        add(&mut layers[0], 0, 60, 0, "c4.wav");

        let sfz = render_instrument(&defaults, &layers, &options()).unwrap();
        assert_eq!(
            sfz,
            "<global>\n\
             ampeg_attack=0.004000\n\
             ampeg_release=0.300000\n\
             \n\
             <group>\n\
             \n\
             <region>\n\
             sample=samples/c4.wav\n\
             pitch_keycenter=60\n\
             \n"
        );
    }

    #[test]
    fn test_knobs() {
        let (defaults, layers) = resolve(
            r#"
            knobs = true
            [layers.body]
            source = "a"
            knob = true
            knobPercent = 50
            [layers.release]
            source = "r"
            "#,
        );

        let control = control_section(&defaults, &layers, true);
        assert_eq!(control.get_opcode_str("label_cc72"), Some("Release"));
        assert_eq!(control.get_opcode_str("set_cc72"), Some("18"));
        assert_eq!(control.get_opcode_str("set_cc73"), Some("0"));
        assert_eq!(control.get_opcode_str("label_cc205"), Some("Release Volume"));
        assert_eq!(control.get_opcode_str("set_cc205"), Some("60"));
        assert_eq!(control.get_opcode_str("label_cc301"), Some("body"));
        assert_eq!(control.get_opcode_str("set_cc301"), Some("63"));
        assert!(control.to_string().contains("set_cc73=0  // Attack = 0%"));

        let without_releases = control_section(&defaults, &layers, false);
        assert!(!without_releases.has_opcode("label_cc205"));

        let global = global_section(&defaults);
        assert_eq!(global.get_opcode_str("ampeg_release_oncc72"), Some("6"));
        assert_eq!(global.get_opcode_str("ampeg_attack_oncc73"), Some("6"));

        let group = group_section(&defaults, &layers[0], 0, VelocityRange::default());
        assert_eq!(group.get_opcode_str("xfin_locc301"), Some("1"));
        assert_eq!(group.get_opcode_str("xfin_hicc301"), Some("127"));

        let release = group_section(&defaults, &layers[1], 1, VelocityRange::default());
        assert_eq!(release.get_opcode_str("trigger"), Some("release"));
        assert_eq!(release.get_opcode_str("gain_oncc205"), Some("10"));
    }

    #[test]
    fn test_no_knobs_no_control_block() {
        let (defaults, mut layers) = resolve("[layers.main]\nsource = \"s\"");
        add(&mut layers[0], 0, 60, 0, "c4.wav");

        assert!(control_section(&defaults, &layers, true).is_empty());
        let sfz = render_instrument(&defaults, &layers, &options()).unwrap();
        assert!(!sfz.contains("<control>"));
        assert!(!sfz.contains("_oncc"));
    }

    #[test]
    fn test_second_layer_knob_cc() {
        let (defaults, layers) = resolve(
            r#"
            [layers.a]
            source = "a"
            [layers.b]
            source = "b"
            knob = true
            "#,
        );

        let control = control_section(&defaults, &layers, true);
        assert_eq!(control.get_opcode_str("label_cc302"), Some("b"));
        assert_eq!(control.get_opcode_str("set_cc302"), Some("127"));
        assert!(!control.has_opcode("label_cc72"));
    }

    #[test]
    fn test_release_layers_dropped_without_releases() {
        let (defaults, mut layers) = resolve(
            r#"
            [layers.main]
            source = "s"
            [layers.tail]
            source = "r"
            isRelease = true
            alwaysRelease = true
            "#,
        );
        add(&mut layers[0], 0, 60, 0, "c4.wav");
        add(&mut layers[1], 0, 60, 0, "c4_rel.wav");

        let sfz = render_instrument(&defaults, &layers, &options()).unwrap();
        assert!(sfz.contains("trigger=release_key"));
        assert!(sfz.contains("c4_rel.wav"));

        let no_releases = EmitOptions {
            releases: false,
            ..options()
        };
        let sfz = render_instrument(&defaults, &layers, &no_releases).unwrap();
        assert!(!sfz.contains("trigger="));
        assert!(!sfz.contains("c4_rel.wav"));
    }

    #[test]
    fn test_group_opcodes() {
        let (defaults, layers) = resolve(
            r#"
            volume = -3
            [layers.main]
            source = "s"
            attack = 0.02
            release = 1.5
            unpitched = true
            "#,
        );

        let velocity = VelocityRange {
            low: Some(0),
            high: Some(63),
        };
        let group = group_section(&defaults, &layers[0], 0, velocity);
        let names: Vec<_> = group.opcodes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["ampeg_attack", "ampeg_release", "pitch_keytrack", "lovel", "hivel", "volume"]
        );
        assert_eq!(group.get_opcode_str("ampeg_attack"), Some("0.020000"));
        assert_eq!(group.get_opcode_str("lovel"), Some("0"));
        assert_eq!(group.get_opcode_str("volume"), Some("-3.000000"));
    }

    #[test]
    fn test_exact_and_fixed_keys() {
        let (defaults, mut layers) = resolve(
            r#"
            [layers.ranged]
            source = "s"
            [layers.exact]
            source = "s"
            exact = true
            "#,
        );
        for layer in layers.iter_mut() {
            add(layer, 0, 59, 0, "b3.wav");
            add(layer, 0, 60, 0, "c4.wav");
            add(layer, 0, 61, 0, "c#4.wav");
            add(layer, 0, 70, 0, "a#4.wav");
        }

        let ranged = partition_layer(&layers[0]);
        let regions = &ranged[0].regions;
        let middle = region_section(&layers[0], &regions[1], Path::new(".")).unwrap();
        assert_eq!(middle.get_opcode_str("key"), Some("60"));
        assert!(!middle.has_opcode("pitch_keycenter"));

        let last = region_section(&layers[0], &regions[3], Path::new(".")).unwrap();
        assert_eq!(last.get_opcode_str("pitch_keycenter"), Some("70"));
        assert_eq!(last.get_opcode_str("lokey"), Some("66"));
        assert!(!last.has_opcode("hikey"));

        let exact = partition_layer(&layers[1]);
        let last = region_section(&layers[1], &exact[0].regions[3], Path::new(".")).unwrap();
        assert_eq!(last.get_opcode_str("key"), Some("70"));
        assert!(!last.has_opcode("lokey"));
    }

    #[test]
    fn test_round_robin_regions() {
        let (defaults, mut layers) = resolve("[layers.main]\nsource = \"s\"");
        add(&mut layers[0], 0, 60, 1, "c4_rr1.wav");
        add(&mut layers[0], 0, 60, 2, "c4_rr2.wav");

        let sfz = render_instrument(&defaults, &layers, &options()).unwrap();
        assert!(sfz.contains("<region>\nseq_length=2\nseq_position=1\nsample=s/c4_rr1.wav\n"));
        assert!(sfz.contains("<region>\nseq_length=2\nseq_position=2\nsample=s/c4_rr2.wav\n"));
    }

    #[test]
    fn test_region_analysis_fields() {
        let (_, mut layers) = resolve("[layers.main]\nsource = \"s\"\nvolume = -2");
        let mut record = SampleRecord::new("c4.wav");
        record.offset = 250;
        record.volume = 1.5;
        layers[0].registry.insert(0, 60, 0, record);

        let groups = partition_layer(&layers[0]);
        let region = region_section(&layers[0], &groups[0].regions[0], Path::new(".")).unwrap();
        assert_eq!(region.get_opcode_str("offset"), Some("250"));
        assert_eq!(region.get_opcode_str("volume"), Some("-0.500000"));
        assert!(!region.has_opcode("pan"));
    }

    #[test]
    fn test_crossfade_regions() {
        let (_, mut layers) = resolve("[layers.main]\nsource = \"s\"\ncrossfade = true");
        add(&mut layers[0], 0, 36, 0, "c3.wav");
        add(&mut layers[0], 0, 40, 0, "e3.wav");
        add(&mut layers[0], 0, 48, 0, "c4.wav");

        let groups = partition_layer(&layers[0]);
        let middle = region_section(&layers[0], &groups[0].regions[1], Path::new(".")).unwrap();
        assert_eq!(middle.get_opcode_str("lokey"), Some("39"));
        assert_eq!(middle.get_opcode_str("hikey"), Some("44"));
        assert_eq!(middle.get_opcode_str("xfin_lokey"), Some("39"));
        assert_eq!(middle.get_opcode_str("xfin_hikey"), Some("40"));
        assert_eq!(middle.get_opcode_str("xfout_lokey"), Some("40"));
        assert_eq!(middle.get_opcode_str("xfout_hikey"), Some("44"));

        let first = region_section(&layers[0], &groups[0].regions[0], Path::new(".")).unwrap();
        assert!(!first.has_opcode("xfin_lokey"));
        assert_eq!(first.get_opcode_str("hikey"), Some("38"));
        assert_eq!(first.get_opcode_str("xfout_hikey"), Some("38"));
    }

    #[test]
    fn test_decoration() {
        let doc = ConfigDocument::parse(
            r#"
            name = "Grand"
            [comment]
            author = "someone"
            [comment.recording]
            mics = 2
            [layers.main]
            source = "s"
            "#,
        )
        .unwrap();
        let configs = doc.layer_configs().unwrap();
        let (defaults, layers) = resolve_layers(&doc.config, &configs, &Overrides::default()).unwrap();
        let settings = doc.settings_dump().unwrap();

        let decorated = EmitOptions {
            decoration: Some(Decoration {
                settings: &settings,
                comment: doc.config.comment.as_ref(),
            }),
            ..options()
        };
        let sfz = render_instrument(&defaults, &layers, &decorated).unwrap();

        assert!(sfz.starts_with("// Instrument: Grand\n\n// Settings used:\n"));
        assert!(sfz.contains("// name = \"Grand\"\n"));
        assert!(sfz.contains("// author: \n// - someone\n// recording: \n// mics: \n// - 2\n\n\n"));
        assert!(sfz.contains("\n<global>\n"));

        let plain = render_instrument(&defaults, &layers, &options()).unwrap();
        assert!(!plain.contains("//"));
    }
}
