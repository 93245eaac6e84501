//! sfbank CLI - The `sfbank` command.
//!
//! Inspects, converts and checks SoundFont banks and SFZ instruments.
//!
//! # Architecture
//!
//! The CLI binary drives the modular crates:
//!
//! - **sfbank-core**: open/save facade, background jobs, configuration
//! - **sfbank-model**: voice resolution and integrity checks
//! - **sfbank-sf2** / **sfbank-sfz**: file formats, reached through core

mod output;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use sfbank_core::jobs::{duplicate_job, load_job, save_job};
use sfbank_core::{Config, FontHandle, Format, Job, Opened};
use sfbank_model::resolve::resolve_preset_voices;
use sfbank_model::{Choice, DuplicateReport, Subtree, Version};
use sfbank_sf2::CodecFailurePolicy;

/// sfbank - SoundFont bank tool
#[derive(Parser, Debug)]
#[command(name = "sfbank")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect, convert and check SoundFont banks", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: platform config directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Hide progress output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the contents of a bank
    Info {
        /// .sf2, .sf3 or .sfz file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Convert between formats
    Convert {
        #[arg(value_name = "IN")]
        input: PathBuf,

        /// Output file, or directory for SFZ
        #[arg(value_name = "OUT")]
        output: PathBuf,

        /// Output format (default: from the extension, then the config)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// SF2 file version, 2.01 or 2.04
        #[arg(long, value_parser = parse_version)]
        sf2_version: Option<Version>,

        /// Compression quality (0.0 - 1.0)
        #[arg(long)]
        quality: Option<f32>,

        /// Store samples the codec fails on as PCM instead of aborting
        #[arg(long)]
        keep_pcm: bool,
    },

    /// List the voices a preset plays for one note
    Resolve {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long, default_value = "0")]
        bank: u16,

        #[arg(short, long, default_value = "0")]
        program: u16,

        #[arg(short, long, default_value = "60")]
        key: u8,

        #[arg(long, default_value = "100")]
        velocity: u8,
    },

    /// Copy a preset with its instruments and samples into another bank
    Copy {
        /// Bank holding the preset
        #[arg(value_name = "FROM")]
        source: PathBuf,

        /// Bank receiving the copy
        #[arg(value_name = "INTO")]
        target: PathBuf,

        #[arg(short, long, default_value = "0")]
        bank: u16,

        #[arg(short, long, default_value = "0")]
        program: u16,

        /// Write the result here instead of over INTO
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// What to do with names INTO already uses
        #[arg(long, value_enum, default_value = "duplicate")]
        on_collision: CollisionArg,
    },

    /// Report load corrections and integrity problems
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Create a default configuration file
    Init,

    /// Show the configuration file path
    ConfigPath,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Sf2,
    Sf3,
    Sfz,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CollisionArg {
    /// Keep both, renaming the copy with a numeric suffix
    Duplicate,
    /// Overwrite the existing entity
    Replace,
    /// Reuse the existing entity
    Ignore,
}

impl From<CollisionArg> for Choice {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Duplicate => Choice::DuplicateAll,
            CollisionArg::Replace => Choice::ReplaceAll,
            CollisionArg::Ignore => Choice::IgnoreAll,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_or_default(),
    };
    let progress = !args.quiet;

    match args.command {
        Commands::Info { file } => {
            let opened = load(&file, progress)?;
            output::print_info(&opened);
            Ok(())
        }
        Commands::Convert {
            input,
            output,
            format,
            sf2_version,
            quality,
            keep_pcm,
        } => {
            let version = sf2_version.unwrap_or_else(|| config.save.sf2_version.into());
            let format = match format {
                Some(FormatArg::Sf2) => Format::Sf2 { version },
                Some(FormatArg::Sf3) => Format::Sf3,
                Some(FormatArg::Sfz) => Format::Sfz,
                None => Format::from_path(&output, version).unwrap_or_else(|| config.default_format()),
            };
            let mut options = config.save_options();
            if let Some(quality) = quality {
                options.quality = quality;
            }
            if keep_pcm {
                options.policy = CodecFailurePolicy::KeepPcm;
            }

            let (handle, report) = load(&input, progress)?.into_handle();
            output::print_warnings(&report.warnings());
            let saved = wait(save_job(&handle, &output, format, options), progress)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            for sample in &saved.fallback_samples {
                log::warn!("Sample '{}' stored uncompressed", sample);
            }
            for sample in &saved.skipped_samples {
                log::warn!("Sample '{}' has no data and was left out", sample);
            }
            println!("Wrote {} file(s) as {}", saved.files.len(), format);
            Ok(())
        }
        Commands::Resolve {
            file,
            bank,
            program,
            key,
            velocity,
        } => {
            let opened = load(&file, progress)?;
            let font = &opened.font;
            let Some(preset) = font.find_preset(bank, program) else {
                bail!("No preset at bank {} program {}", bank, program);
            };
            let voices = resolve_preset_voices(font, preset, key, velocity)
                .context("Failed to resolve voices")?;
            output::print_voices(font, &voices);
            Ok(())
        }
        Commands::Copy {
            source,
            target,
            bank,
            program,
            output,
            on_collision,
        } => {
            let (from, _) = load(&source, progress)?.into_handle();
            let (into, report) = load(&target, progress)?.into_handle();
            output::print_warnings(&report.warnings());

            let copied = copy_preset(
                &from,
                &into,
                (bank, program),
                config.duplicate.suffix_start,
                on_collision.into(),
                progress,
            )?;
            println!(
                "Copied preset {}:{}: {} created, {} replaced, {} reused",
                bank, program, copied.created, copied.replaced, copied.ignored
            );

            let out = output.unwrap_or(target);
            let version = config.save.sf2_version.into();
            let format = Format::from_path(&out, version).unwrap_or_else(|| config.default_format());
            wait(save_job(&into, &out, format, config.save_options()), progress)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            Ok(())
        }
        Commands::Check { file } => {
            let opened = load(&file, progress)?;
            let problems = output::print_check(&opened);
            if problems > 0 {
                bail!("{} problem(s) found", problems);
            }
            Ok(())
        }
        Commands::Init => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            Ok(())
        }
        Commands::ConfigPath => {
            println!("{}", Config::config_path()?.display());
            Ok(())
        }
    }
}

/// Warnings by default; `-v` raises the level and `RUST_LOG` overrides it.
fn init_logger(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(level_for(verbose))
        .parse_default_env()
        .init();
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn load(path: &Path, progress: bool) -> Result<Opened> {
    wait(load_job(path), progress).with_context(|| format!("Failed to open {}", path.display()))
}

/// Wait for a job, drawing its progress on stderr.
fn wait<T>(job: Job<T>, progress: bool) -> sfbank_core::Result<T> {
    if progress {
        let mut drawn = false;
        for update in job.progress().iter() {
            eprint!("\r{} {:>3.0}%", job.name(), update.fraction() * 100.0);
            drawn = true;
        }
        if drawn {
            eprintln!();
        }
    }
    job.join()
}

/// Copy one preset subtree, answering every name collision with `choice`.
fn copy_preset(
    from: &FontHandle,
    into: &FontHandle,
    (bank, program): (u16, u16),
    suffix_start: u32,
    choice: Choice,
    progress: bool,
) -> Result<DuplicateReport> {
    let Some(preset) = from.read(|font| font.find_preset(bank, program)) else {
        bail!("No preset at bank {} program {}", bank, program);
    };
    let job = duplicate_job(from, into, vec![Subtree::Preset(preset)], suffix_start, move |collision| {
        log::info!("{} '{}' already exists", collision.kind, collision.name);
        choice
    })?;
    Ok(wait(job, progress)?)
}

fn parse_version(s: &str) -> std::result::Result<Version, String> {
    match s {
        "2.01" | "2.1" => Ok(Version::SF2_01),
        "2.04" | "2.4" => Ok(Version::SF2_04),
        other => Err(format!("unsupported SF2 version '{}', expected 2.01 or 2.04", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("2.04"), Ok(Version::SF2_04));
        assert_eq!(parse_version("2.1"), Ok(Version::SF2_01));
        assert!(parse_version("3.01").is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }

    fn kit(name: &str) -> sfbank_model::SoundFont {
        use sfbank_model::{Instrument, Preset, Sample, SampleData, SoundFont, Zone};
        let mut font = SoundFont::new(name);
        let kick = font
            .add_sample(Sample::new("Kick", SampleData::from_pcm(vec![7; 64]), 44100))
            .unwrap();
        let inst = font
            .add_instrument(Instrument::new("Kit").with_zone(Zone::new(kick)))
            .unwrap();
        font.add_preset(Preset::new("Standard", 128, 0).with_zone(Zone::new(inst)))
            .unwrap();
        font
    }

    #[test]
    fn test_copy_uses_configured_suffix() {
        let config: Config = toml::from_str("[duplicate]\nsuffix_start = 5\n").unwrap();
        let from = FontHandle::new(kit("From"));
        let into = FontHandle::new(kit("Into"));

        let report = copy_preset(
            &from,
            &into,
            (128, 0),
            config.duplicate.suffix_start,
            CollisionArg::Duplicate.into(),
            false,
        )
        .unwrap();
        assert_eq!(report.created, 3);
        into.read(|font| {
            assert!(font.find_sample("Kick5").is_some());
            assert!(font.find_instrument("Kit5").is_some());
            assert_eq!(font.preset_count(), 2);
        });
    }

    #[test]
    fn test_copy_of_missing_preset_fails() {
        let from = FontHandle::new(kit("From"));
        let into = FontHandle::new(kit("Into"));
        let result = copy_preset(&from, &into, (0, 5), 2, Choice::IgnoreAll, false);
        assert!(result.is_err());
        assert!(!into.is_editing());
    }

    #[test]
    fn test_convert_arguments() {
        let args = Args::parse_from([
            "sfbank", "convert", "in.sf2", "out", "--format", "sfz", "-vv", "--keep-pcm",
        ]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Commands::Convert { format, keep_pcm, .. } => {
                assert_eq!(format, Some(FormatArg::Sfz));
                assert!(keep_pcm);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
