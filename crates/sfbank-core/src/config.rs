//! Configuration file support for sfbank
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/sfbank/config.toml`
//! - macOS: `~/Library/Application Support/sfbank/config.toml`
//! - Windows: `%APPDATA%\sfbank\config.toml`

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sfbank_model::{IoKind, Version};
use sfbank_sf2::CodecFailurePolicy;
use sfbank_sfz::ExportOptions;

use crate::error::{CoreError, Result};
use crate::io::{Format, SaveOptions};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Saving and conversion
    pub save: SaveSettings,
    /// SFZ export
    pub sfz: SfzSettings,
    /// Subtree duplication
    pub duplicate: DuplicateSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(CoreError::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, &e, IoKind::Read))?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, &e, IoKind::Create))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| CoreError::io(path, &e, IoKind::Write))?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "sfbank") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(CoreError::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, &e, IoKind::Create))?;
        }
        fs::write(&path, DEFAULT_CONFIG).map_err(|e| CoreError::io(&path, &e, IoKind::Write))?;
        Ok(path)
    }

    /// Format used when the output path does not name one
    pub fn default_format(&self) -> Format {
        match self.save.format {
            SaveFormat::Sf2 => Format::Sf2 {
                version: self.save.sf2_version.into(),
            },
            SaveFormat::Sf3 => Format::Sf3,
            SaveFormat::Sfz => Format::Sfz,
        }
    }

    /// Format for `path`, falling back to the configured default
    pub fn format_for(&self, path: &Path) -> Format {
        Format::from_path(path, self.save.sf2_version.into()).unwrap_or_else(|| self.default_format())
    }

    pub fn save_options(&self) -> SaveOptions {
        SaveOptions {
            quality: self.save.quality,
            policy: self.save.on_codec_failure.into(),
            sfz: ExportOptions {
                classify: self.sfz.classify,
                sample_dir: self.sfz.sample_dir.clone(),
            },
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# sfbank configuration file

[save]
# Format for output paths without a known extension: "sf2", "sf3" or "sfz"
format = "sf2"

# SF2 file version: "2.01" or "2.04" (2.04 keeps 24-bit samples)
sf2_version = "2.01"

# Compressed export quality (0.0 - 1.0)
quality = 0.6

# When the sample codec fails: "abort" or "keep_pcm"
on_codec_failure = "abort"

[sfz]
# Sort exported presets into General MIDI family directories
classify = true

# Sample directory next to each exported .sfz file
sample_dir = "samples"

[duplicate]
# First number appended to a colliding name ("Kick" -> "Kick2")
suffix_start = 2
"#;

/// Output format preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    #[default]
    Sf2,
    Sf3,
    Sfz,
}

/// Plain SF2 file version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sf2Version {
    #[default]
    #[serde(rename = "2.01")]
    V2_01,
    #[serde(rename = "2.04")]
    V2_04,
}

impl From<Sf2Version> for Version {
    fn from(version: Sf2Version) -> Self {
        match version {
            Sf2Version::V2_01 => Version::SF2_01,
            Sf2Version::V2_04 => Version::SF2_04,
        }
    }
}

/// Codec failure handling during compressed export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Abort,
    KeepPcm,
}

impl From<FailurePolicy> for CodecFailurePolicy {
    fn from(policy: FailurePolicy) -> Self {
        match policy {
            FailurePolicy::Abort => CodecFailurePolicy::Abort,
            FailurePolicy::KeepPcm => CodecFailurePolicy::KeepPcm,
        }
    }
}

/// Save settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSettings {
    pub format: SaveFormat,
    pub sf2_version: Sf2Version,
    /// Compressed export quality (0.0 - 1.0)
    pub quality: f32,
    pub on_codec_failure: FailurePolicy,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            format: SaveFormat::default(),
            sf2_version: Sf2Version::default(),
            quality: 0.6,
            on_codec_failure: FailurePolicy::default(),
        }
    }
}

/// SFZ export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SfzSettings {
    pub classify: bool,
    pub sample_dir: String,
}

impl Default for SfzSettings {
    fn default() -> Self {
        let options = ExportOptions::default();
        Self {
            classify: options.classify,
            sample_dir: options.sample_dir,
        }
    }
}

/// Duplication settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateSettings {
    pub suffix_start: u32,
}

impl Default for DuplicateSettings {
    fn default() -> Self {
        Self { suffix_start: 2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file_matches_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_loads() {
        let config: Config = toml::from_str("[save]\nformat = \"sf3\"\n").unwrap();
        assert_eq!(config.save.format, SaveFormat::Sf3);
        assert_eq!(config.save.quality, 0.6);
        assert!(config.sfz.classify);
        assert_eq!(config.duplicate.suffix_start, 2);
        assert_eq!(config.default_format(), Format::Sf3);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = Config::default();
        config.save.sf2_version = Sf2Version::V2_04;
        config.save.on_codec_failure = FailurePolicy::KeepPcm;
        config.sfz.sample_dir = "wav".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let options = loaded.save_options();
        assert_eq!(options.policy, CodecFailurePolicy::KeepPcm);
        assert_eq!(options.sfz.sample_dir, "wav");
    }

    #[test]
    fn test_format_for_path() {
        let mut config = Config::default();
        config.save.sf2_version = Sf2Version::V2_04;
        assert_eq!(
            config.format_for(Path::new("out.SF2")),
            Format::Sf2 {
                version: Version::SF2_04
            }
        );
        assert_eq!(config.format_for(Path::new("out/")), config.default_format());
    }

    #[test]
    fn test_bad_value_is_a_parse_error() {
        let err = toml::from_str::<Config>("[save]\non_codec_failure = \"retry\"\n").unwrap_err();
        assert!(CoreError::from(err).to_string().starts_with("TOML parse error"));
    }
}
