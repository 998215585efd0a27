//! SFZ output model
//!
//! Sections are built up opcode by opcode and rendered in insertion order,
//! so the generated file reads the same way every time.
//!
//! # SFZ Section Structure
//!
//! ```text
//! <group>
//! lovel=64
//! hivel=127
//!
//! <region>
//! sample=piano_C4.wav
//! key=60
//! ```

use std::fmt;

/// Types of SFZ sections written by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType {
    /// Controller labels and default values
    Control,
    /// Settings that apply to all regions
    Global,
    /// Settings for one velocity layer of one instrument layer
    Group,
    /// A single sample
    Region,
}

impl SectionType {
    /// Returns the section header string, including angle brackets
    pub fn header_str(&self) -> &'static str {
        match self {
            Self::Control => "<control>",
            Self::Global => "<global>",
            Self::Group => "<group>",
            Self::Region => "<region>",
        }
    }
}

/// A single `name=value` line, optionally followed by a comment
#[derive(Debug, Clone, PartialEq)]
pub struct Opcode {
    pub name: String,
    pub value: String,
    pub comment: Option<String>,
}

/// A section and its opcodes in output order
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// The type of section
    pub section_type: SectionType,
    /// Opcodes in the order they were added
    pub opcodes: Vec<Opcode>,
}

impl Section {
    /// Creates a new section with no opcodes
    pub fn new(section_type: SectionType) -> Self {
        Self {
            section_type,
            opcodes: Vec::new(),
        }
    }

    /// Appends an opcode
    pub fn add_opcode(&mut self, name: impl Into<String>, value: impl fmt::Display) {
        self.opcodes.push(Opcode {
            name: name.into(),
            value: value.to_string(),
            comment: None,
        });
    }

    /// Appends an opcode with a trailing `//` comment
    pub fn add_opcode_with_comment(
        &mut self,
        name: impl Into<String>,
        value: impl fmt::Display,
        comment: impl Into<String>,
    ) {
        self.opcodes.push(Opcode {
            name: name.into(),
            value: value.to_string(),
            comment: Some(comment.into()),
        });
    }

    /// Gets the value of the first opcode with this name
    pub fn get_opcode_str(&self, name: &str) -> Option<&str> {
        self.opcodes
            .iter()
            .find(|op| op.name == name)
            .map(|op| op.value.as_str())
    }

    /// Whether an opcode with this name was added
    pub fn has_opcode(&self, name: &str) -> bool {
        self.get_opcode_str(name).is_some()
    }

    /// Whether the section has no opcodes
    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }
}

impl fmt::Display for Section {
    /// Header line, one line per opcode, then a blank line
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.section_type.header_str())?;
        for op in &self.opcodes {
            match &op.comment {
                Some(comment) => writeln!(f, "{}={}  // {}", op.name, op.value, comment)?,
                None => writeln!(f, "{}={}", op.name, op.value)?,
            }
        }
        writeln!(f)
    }
}

/// Formats a float the way every numeric opcode is written
pub fn format_float(value: f64) -> String {
    format!("{:.6}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_section() {
        let mut section = Section::new(SectionType::Region);
        section.add_opcode("sample", "piano/C4.wav");
        section.add_opcode("key", 60);

        assert_eq!(
            section.to_string(),
            "<region>\nsample=piano/C4.wav\nkey=60\n\n"
        );
    }

    #[test]
    fn test_render_comment() {
        let mut section = Section::new(SectionType::Control);
        section.add_opcode_with_comment("set_cc73", 0, "Attack = 0%");

        assert_eq!(section.to_string(), "<control>\nset_cc73=0  // Attack = 0%\n\n");
    }

    #[test]
    fn test_get_opcode_keeps_first() {
        let mut section = Section::new(SectionType::Group);
        assert!(section.is_empty());
        section.add_opcode("lovel", 10);
        section.add_opcode("lovel", 20);

        assert_eq!(section.get_opcode_str("lovel"), Some("10"));
        assert!(section.has_opcode("lovel"));
        assert!(!section.has_opcode("hivel"));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.004), "0.004000");
        assert_eq!(format_float(-3.25), "-3.250000");
    }
}
