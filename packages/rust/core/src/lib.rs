//! Core pipeline orchestration and domain logic for proposalgen.
//!
//! This crate ties together research, use-case generation, resource
//! collection, and proposal assembly into one end-to-end run
//! ([`pipeline::run`]).

pub mod assembler;
pub mod llm;
pub mod pipeline;
pub mod proposal;
pub mod research;
pub mod resources;
pub mod use_cases;

#[cfg(test)]
mod test_support;

pub use assembler::{ArtifactMeta, RunFiles, RunManifest, write_run};
pub use llm::{GeminiClient, Generation, TextGenerator};
pub use pipeline::{ProgressReporter, RunResult, Services, SilentProgress, run};
pub use use_cases::UseCaseParse;
