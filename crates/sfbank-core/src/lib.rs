//! Runtime layer for sfbank.
//!
//! This crate ties the entity graph and the file codecs together for an
//! editor:
//! - Opening and saving banks by path ([`open`], [`save`])
//! - Shared instances with a single writer ([`FontHandle`], [`EditGuard`])
//! - Background jobs with a progress side channel and cooperative
//!   cancellation ([`Job`], [`jobs`])
//! - A TOML configuration file ([`Config`])
//!
//! # Architecture
//!
//! Every mutation works on a copy of the font and publishes it only on
//! success, so cancelling a job or failing an edit leaves the instance
//! untouched. Long operations run on their own thread; the controlling
//! thread polls [`Job::progress`] and collects the result with
//! [`Job::join`].
//!
//! # Example
//!
//! ```no_run
//! use sfbank_core::{jobs, Format, SaveOptions};
//!
//! let job = jobs::load_job("piano.sf2");
//! for progress in job.progress().iter() {
//!     println!("{:.0}%", progress.fraction() * 100.0);
//! }
//! let (handle, report) = job.join()?.into_handle();
//! for warning in report.warnings() {
//!     println!("{}", warning);
//! }
//!
//! let save = jobs::save_job(&handle, "piano.sf3", Format::Sf3, SaveOptions::default());
//! save.join()?;
//! # Ok::<(), sfbank_core::CoreError>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handle;
pub mod io;
pub mod job;
pub mod jobs;

pub use codec::WavCodec;
pub use config::Config;
pub use error::{CoreError, Result};
pub use handle::{EditGuard, FontHandle};
pub use io::{open, save, save_with, Format, OpenReport, Opened, SaveOptions, SaveReport};
pub use job::{Job, JobContext, Progress};
