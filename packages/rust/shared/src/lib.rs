//! Shared types, error model, and configuration for proposalgen.
//!
//! This crate is the foundation depended on by all other proposalgen crates.
//! It provides:
//! - [`ProposalGenError`], the unified error type
//! - Domain types ([`Subject`], [`ResearchSummary`], [`UseCase`], [`Resource`], [`Proposal`])
//! - Configuration ([`AppConfig`] from disk, [`RunConfig`] resolved against the environment)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_PATH_ENV, CatalogSettings, CatalogsConfig, DefaultsConfig, GeminiConfig,
    GeminiSettings, KaggleCredentials, RunConfig, SearchConfig, SearchSettings, Secret,
    config_dir, config_file_path, load_config, load_config_from,
};
pub use error::{ProposalGenError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, Proposal, ProposedUseCase, Provenance, ResearchSummary, Resource,
    ResourceCollection, ResourceKind, ResourceSource, RunId, SourceRef, Stage, StageWarning,
    Staged, Subject, UseCase, WarningKind, slugify,
};
