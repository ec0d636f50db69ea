// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs the commands of pipeline steps with `tokio::process::Command`.
//!
//! - [`command`] tokenises configured command lines.
//! - [`runner`] spawns a step, drains its output, registers it with the
//!   [`ProcessRegistry`](crate::registry::ProcessRegistry) and applies the
//!   wait policy. It also defines the [`StepRunner`] trait so tests can swap
//!   in a fake runner.
//! - [`outcome`] holds the per-step result type.

pub mod command;
pub mod outcome;
pub mod runner;

pub use command::CommandLine;
pub use outcome::{ScriptOutcome, merge_output};
pub use runner::{ProcessRunner, StepFuture, StepRunner};
