//! Command Line Interface (CLI) layer for eozonal.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`): logging setup, configuration
//! loading, Ctrl-C cancellation and the run summary. It wires user-provided
//! options to the library functionality exposed via `eozonal::api`.
//!
//! If you are embedding eozonal into another application, prefer using
//! the high-level `eozonal::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
