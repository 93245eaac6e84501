use std::collections::HashMap;
use std::path::PathBuf;

use super::path_utils::resolve_absolute_path;
use super::values::OpcodeValue;
use crate::error::Result;

/// Represents a complete SFZ file with all sections and regions.
///
/// Directives are already applied: `#include` files are spliced in and
/// `#define` variables substituted.
///
/// # SFZ Hierarchy
///
/// - `<control>`: settings such as `default_path` for samples
/// - `<global>`: settings that apply to all regions
/// - `<master>`: settings that apply to the groups that follow it
/// - `<group>`: settings that apply to the regions that follow it
/// - `<region>`: the basic playable unit, one sample each
/// - `<curve>`, `<effect>`: kept but not interpreted
///
/// # Inheritance
///
/// Opcodes cascade down the hierarchy. A region's opcodes are global, then
/// master, then group, then its own, each level overriding the one above.
/// Sections are stored flattened: every master, group and region already
/// holds the opcodes it inherits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SfzFile {
    /// Global section. A later `<global>` replaces an earlier one.
    pub global: Option<SfzSection>,

    /// Control section, not inherited by regions.
    ///
    /// ```text
    /// <control>
    /// default_path=samples/piano/
    /// ```
    pub control: Option<SfzSection>,

    pub masters: Vec<SfzSection>,
    pub groups: Vec<SfzSection>,

    /// Region sections, each defining one sample and how it plays.
    ///
    /// ```text
    /// <region>
    /// sample=C4.wav
    /// key=60
    /// ```
    pub regions: Vec<SfzSection>,

    pub curves: Vec<SfzSection>,
    pub effects: Vec<SfzSection>,

    /// Source file path if loaded from disk.
    ///
    /// Sample paths are resolved relative to this file, including the ones
    /// that appear in included files.
    pub source_file: Option<PathBuf>,

    /// Files spliced in through `#include`, in the order they were read.
    pub includes: Vec<PathBuf>,
}

impl SfzFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section to the collection matching its type.
    pub fn add_section(&mut self, section: SfzSection) {
        match section.section_type {
            SfzSectionType::Global => self.global = Some(section),
            SfzSectionType::Control => self.control = Some(section),
            SfzSectionType::Master => self.masters.push(section),
            SfzSectionType::Group => self.groups.push(section),
            SfzSectionType::Region => self.regions.push(section),
            SfzSectionType::Curve => self.curves.push(section),
            SfzSectionType::Effect => self.effects.push(section),
        }
    }

    pub fn has_regions(&self) -> bool {
        !self.regions.is_empty()
    }

    /// The `default_path` opcode of the control section.
    pub fn default_path(&self) -> Option<&str> {
        self.control
            .as_ref()
            .and_then(|ctrl| ctrl.get_opcode_str("default_path"))
    }

    /// Resolve the `sample` opcode of a section to a file path.
    ///
    /// Absolute sample paths are used as they are. Relative ones are joined
    /// to `default_path`, then to the directory of the SFZ file when it is
    /// known.
    pub fn resolve_sample_path(&self, section: &SfzSection) -> Option<PathBuf> {
        let sample_path = section.get_opcode_str("sample")?;
        Some(resolve_absolute_path(
            sample_path,
            self.default_path(),
            self.source_file.as_deref(),
        ))
    }
}

/// Types of SFZ sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SfzSectionType {
    Global,
    Control,
    Master,
    Group,
    Region,
    Curve,
    Effect,
}

impl SfzSectionType {
    /// Section type for a header name without the angle brackets.
    pub fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_lowercase().as_str() {
            "global" => Some(Self::Global),
            "control" => Some(Self::Control),
            "master" => Some(Self::Master),
            "group" => Some(Self::Group),
            "region" => Some(Self::Region),
            "curve" => Some(Self::Curve),
            "effect" => Some(Self::Effect),
            _ => None,
        }
    }

    /// The header as written in a file, e.g. `<region>`.
    pub fn header_str(&self) -> &'static str {
        match self {
            Self::Global => "<global>",
            Self::Control => "<control>",
            Self::Master => "<master>",
            Self::Group => "<group>",
            Self::Region => "<region>",
            Self::Curve => "<curve>",
            Self::Effect => "<effect>",
        }
    }
}

/// A section of an SFZ file: its type and its opcode=value pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct SfzSection {
    pub section_type: SfzSectionType,
    pub opcodes: HashMap<String, String>,
}

impl SfzSection {
    pub fn new(section_type: SfzSectionType) -> Self {
        Self {
            section_type,
            opcodes: HashMap::new(),
        }
    }

    pub fn add_opcode(&mut self, name: String, value: String) {
        self.opcodes.insert(name, value);
    }

    pub fn get_opcode_str(&self, name: &str) -> Option<&str> {
        self.opcodes.get(name).map(|s| s.as_str())
    }

    pub fn has_opcode(&self, name: &str) -> bool {
        self.opcodes.contains_key(name)
    }

    /// Typed opcode value: `Ok(None)` when absent, an error when present but
    /// not convertible.
    ///
    /// ```
    /// use sfbank_sfz::parser::{parse_sfz_str, Note};
    ///
    /// let sfz = parse_sfz_str("<region> sample=a.wav key=c#4 volume=-6.5").unwrap();
    /// let region = &sfz.regions[0];
    /// assert_eq!(region.get::<Note>("key").unwrap(), Some(Note(61)));
    /// assert_eq!(region.get::<f64>("volume").unwrap(), Some(-6.5));
    /// assert_eq!(region.get::<f64>("pan").unwrap(), None);
    /// ```
    pub fn get<T: OpcodeValue>(&self, name: &str) -> Result<Option<T>> {
        self.get_opcode_str(name)
            .map(|value| T::parse_opcode(name, value))
            .transpose()
    }
}
