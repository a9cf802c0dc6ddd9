//! Sequential, failure-isolating resource collection across catalogs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use proposalgen_shared::{CatalogSettings, ResourceCollection, ResourceSource, UseCase};
use tracing::{info, instrument, warn};

use crate::adapters::CatalogRegistry;
use crate::keywords::derive_keywords;

/// Knobs for a collection pass.
#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    pub keywords_per_use_case: usize,
    pub results_per_keyword: usize,
}

impl From<&CatalogSettings> for CollectOptions {
    fn from(settings: &CatalogSettings) -> Self {
        Self {
            keywords_per_use_case: settings.keywords_per_use_case,
            results_per_keyword: settings.results_per_keyword,
        }
    }
}

/// One catalog query that failed.
#[derive(Debug, Clone)]
pub struct CatalogFailure {
    pub source: ResourceSource,
    pub keyword: String,
    /// Index of the use case the query was made for.
    pub use_case: usize,
    pub message: String,
}

impl std::fmt::Display for CatalogFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} search for \"{}\" (use case {}) failed: {}",
            self.source,
            self.keyword,
            self.use_case + 1,
            self.message
        )
    }
}

/// Outcome of a collection pass.
#[derive(Debug, Clone, Default)]
pub struct CollectResult {
    pub collection: ResourceCollection,
    pub failures: Vec<CatalogFailure>,
    /// Number of catalog queries issued.
    pub queries: usize,
    /// Resources returned before deduplication.
    pub raw_hits: usize,
    pub duration: Duration,
}

/// Query every catalog for every derived keyword of every use case, one at a time.
///
/// A failing query is recorded and skipped; it never stops the remaining
/// catalogs, keywords, or use cases. Resources are deduplicated by URL across
/// the whole pass, keeping the first record seen, and each use case lists the
/// resources its own queries returned in discovery order.
#[instrument(skip_all, fields(use_cases = use_cases.len(), catalogs = registry.len()))]
pub async fn collect(
    registry: &CatalogRegistry,
    use_cases: &[UseCase],
    opts: CollectOptions,
) -> CollectResult {
    let start = Instant::now();
    let mut result = CollectResult {
        collection: ResourceCollection {
            resources: Vec::new(),
            by_use_case: vec![Vec::new(); use_cases.len()],
        },
        ..Default::default()
    };
    let mut index_by_url: HashMap<String, usize> = HashMap::new();

    for (uc_index, use_case) in use_cases.iter().enumerate() {
        let keywords = derive_keywords(use_case, opts.keywords_per_use_case);
        info!(use_case = %use_case.title, ?keywords, "collecting resources");

        for keyword in &keywords {
            for catalog in registry.iter() {
                result.queries += 1;
                let found = match catalog.search(keyword, opts.results_per_keyword).await {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(catalog = catalog.source().id(), %keyword, error = %e, "catalog query failed");
                        result.failures.push(CatalogFailure {
                            source: catalog.source(),
                            keyword: keyword.clone(),
                            use_case: uc_index,
                            message: e.to_string(),
                        });
                        continue;
                    }
                };

                result.raw_hits += found.len();
                for resource in found {
                    let idx = match index_by_url.get(&resource.url) {
                        Some(&idx) => idx,
                        None => {
                            let idx = result.collection.resources.len();
                            index_by_url.insert(resource.url.clone(), idx);
                            result.collection.resources.push(resource);
                            idx
                        }
                    };
                    let attached = &mut result.collection.by_use_case[uc_index];
                    if !attached.contains(&idx) {
                        attached.push(idx);
                    }
                }
            }
        }
    }

    result.duration = start.elapsed();
    info!(
        unique = result.collection.len(),
        raw = result.raw_hits,
        queries = result.queries,
        failures = result.failures.len(),
        duration_ms = result.duration.as_millis() as u64,
        "resource collection complete"
    );
    result
}
