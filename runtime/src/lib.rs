//! Ghostscript Host Runtime
//!
//! This crate wraps the Ghostscript interpreter API (`gsapi_*`) behind a
//! lifecycle-checked [`Instance`]. The library allows a single live
//! interpreter per process and mixes control signals into its error codes;
//! both rules are enforced here so callers cannot get them wrong.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │    caller (gshost-tools, gshost CLI)    │
//! └────────────────┬────────────────────────┘
//!                  │
//!                  │ configure / init / run / exit
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │    gshost-runtime (this crate)          │
//! │  ┌─────────────────────────────────┐    │
//! │  │    Instance                     │    │
//! │  │  - lifecycle state machine      │    │
//! │  │  - execution modes              │    │
//! │  │  - parameters, path control     │    │
//! │  └─────────────────────────────────┘    │
//! │  ┌─────────────────────────────────┐    │
//! │  │    NativeHandle                 │    │
//! │  │  - process-wide instance slot   │    │
//! │  └─────────────────────────────────┘    │
//! │  ┌─────────────────────────────────┐    │
//! │  │    error                        │    │
//! │  │  - is_error / is_fatal          │    │
//! │  │  - check_error / check_fatal    │    │
//! │  └─────────────────────────────────┘    │
//! └────────────────┬────────────────────────┘
//!                  │ Engine trait
//!        ┌─────────┴──────────┐
//!        ▼                    ▼
//! ┌──────────────┐    ┌──────────────────┐
//! │ NativeEngine │    │ testing::        │
//! │ (libgs via   │    │ MockEngine       │
//! │  gshost-sys) │    │ (scripted)       │
//! └──────────────┘    └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use gshost_runtime::{Instance, LoggingStdio};
//!
//! fn main() -> gshost_runtime::Result<()> {
//!     let mut gs = Instance::new()?;
//!     gs.set_stdio(LoggingStdio::new())?;
//!     gs.init_with_args(&["-dSAFER", "-dBATCH", "-dNOPAUSE", "-sDEVICE=png16m",
//!                         "-r150", "-sOutputFile=page-%d.png"])?;
//!     let exit_code = gs.run_file("input.pdf")?;
//!     println!("interpreter exit code {exit_code}");
//!     Ok(())
//!     // dropping `gs` runs exit and releases the instance
//! }
//! ```

#![warn(missing_docs)]

pub mod args;
pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod instance;
pub mod io;
#[cfg(feature = "native")]
pub mod native;
pub mod params;
pub mod path_control;
pub mod revision;
pub mod testing;

// Re-export main types
pub use args::{ArgEncoding, EncodedArgs};
pub use config::InstanceConfig;
pub use engine::{default_engine, revision, Engine};
pub use error::{check_error, check_fatal, error_message, is_error, is_fatal, ErrorCode, GsError, Result};
pub use handle::NativeHandle;
pub use instance::{Instance, State};
pub use io::{CaptureStdout, CalloutEvent, CalloutHandler, CalloutId, LoggingStdio, OutputBuffer, PollHandler, StdioHandler};
#[cfg(feature = "native")]
pub use native::NativeEngine;
pub use params::{ParamInfo, ParamIter, ParamType, ParamValue};
pub use path_control::PathKind;
pub use revision::Revision;
