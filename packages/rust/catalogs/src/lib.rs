//! Public resource catalogs and the collector that queries them.
//!
//! This crate provides:
//! - [`adapters`]: GitHub, HuggingFace, and Kaggle search behind the [`Catalog`] trait
//! - [`derive_keywords`]: turns a use case into catalog search terms
//! - [`collect`]: runs every query, isolates failures, deduplicates by URL

pub mod adapters;
pub mod collector;
pub mod keywords;

pub use adapters::{Catalog, CatalogRegistry, GitHubCatalog, HuggingFaceCatalog, KaggleCatalog};
pub use collector::{CatalogFailure, CollectOptions, CollectResult, collect};
pub use keywords::{LAST_RESORT_KEYWORD, derive_keywords};
