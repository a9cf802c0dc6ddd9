//! Resource collection stage.
//!
//! Thin wrapper over [`proposalgen_catalogs::collect`] that turns isolated
//! catalog failures into stage warnings.

use tracing::instrument;

use proposalgen_catalogs::{CatalogRegistry, CollectOptions, CollectResult, collect};
use proposalgen_shared::{ResourceCollection, Stage, StageWarning, Staged, UseCase, WarningKind};

/// Counters reported alongside the collection, for logs and the run manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CollectStats {
    pub queries: usize,
    pub raw_hits: usize,
    pub unique: usize,
    pub failures: usize,
}

/// Find resources for every use case. Never fails; catalog errors become warnings.
#[instrument(skip_all, fields(use_cases = use_cases.len()))]
pub async fn collect_resources(
    registry: &CatalogRegistry,
    use_cases: &[UseCase],
    opts: CollectOptions,
) -> (Staged<ResourceCollection>, CollectStats) {
    let CollectResult {
        collection,
        failures,
        queries,
        raw_hits,
        ..
    } = collect(registry, use_cases, opts).await;

    let stats = CollectStats {
        queries,
        raw_hits,
        unique: collection.len(),
        failures: failures.len(),
    };

    let mut warnings: Vec<StageWarning> = failures
        .iter()
        .map(|f| StageWarning::new(Stage::Resources, WarningKind::UpstreamUnavailable, f.to_string()))
        .collect();

    if collection.is_empty() && !use_cases.is_empty() {
        warnings.push(StageWarning::new(
            Stage::Resources,
            WarningKind::Fallback,
            "no resources were found for any use case",
        ));
    }

    (Staged::with_warnings(collection, warnings), stats)
}

#[cfg(test)]
mod tests {
    use proposalgen_shared::ResourceSource;

    use super::*;
    use crate::test_support::FakeCatalog;

    fn opts() -> CollectOptions {
        CollectOptions {
            keywords_per_use_case: 1,
            results_per_keyword: 3,
        }
    }

    fn use_cases() -> Vec<UseCase> {
        vec![
            UseCase::new("Demand Forecasting", "Predict demand.", "Less waste."),
            UseCase::new("Fraud Detection", "Flag fraud.", "Lower losses."),
        ]
    }

    #[tokio::test]
    async fn failing_catalog_becomes_warnings() {
        let registry = CatalogRegistry::from_catalogs(vec![
            Box::new(FakeCatalog::failing(ResourceSource::GitHub)),
            Box::new(FakeCatalog::returning(
                ResourceSource::HuggingFace,
                &["https://huggingface.co/acme/forecaster"],
            )),
            Box::new(FakeCatalog::returning(
                ResourceSource::Kaggle,
                &["https://www.kaggle.com/datasets/acme/sales"],
            )),
        ]);

        let (staged, stats) = collect_resources(&registry, &use_cases(), opts()).await;

        assert_eq!(staged.artifact.len(), 2);
        assert_eq!(stats.queries, 6);
        assert_eq!(stats.raw_hits, 4);
        assert_eq!(stats.failures, 2);
        assert_eq!(staged.warnings.len(), 2);
        assert!(staged.warnings.iter().all(|w| w.stage == Stage::Resources));
        assert!(staged.warnings[0].message.contains("GitHub"));
    }

    #[tokio::test]
    async fn nothing_found_is_reported() {
        let registry = CatalogRegistry::from_catalogs(vec![Box::new(FakeCatalog::returning(
            ResourceSource::GitHub,
            &[],
        ))]);

        let (staged, stats) = collect_resources(&registry, &use_cases(), opts()).await;

        assert!(staged.artifact.is_empty());
        assert_eq!(stats.unique, 0);
        assert_eq!(staged.warnings.len(), 1);
        assert_eq!(staged.warnings[0].kind, WarningKind::Fallback);
    }
}
