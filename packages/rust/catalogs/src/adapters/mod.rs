//! Catalog trait and built-in catalog adapters.
//!
//! Each adapter turns a keyword into a short list of [`Resource`]s from one
//! public catalog. Adapters never see each other; isolation of failures is the
//! collector's job.

mod github;
mod huggingface;
mod kaggle;

use async_trait::async_trait;
use proposalgen_shared::{CatalogSettings, ProposalGenError, Resource, ResourceSource, Result};
use reqwest::{Client, Response};

pub use github::GitHubCatalog;
pub use huggingface::HuggingFaceCatalog;
pub use kaggle::KaggleCatalog;

/// User-Agent string for catalog requests (GitHub rejects requests without one).
const USER_AGENT: &str = concat!("proposalgen/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A searchable catalog of datasets, models, or code.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Which catalog this is.
    fn source(&self) -> ResourceSource;

    /// Search for `keyword`, returning at most `limit` resources in the catalog's ranking.
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Resource>>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds catalogs in query order.
pub struct CatalogRegistry {
    catalogs: Vec<Box<dyn Catalog>>,
}

impl CatalogRegistry {
    /// GitHub, HuggingFace, and Kaggle, configured from `settings`.
    pub fn live(settings: &CatalogSettings) -> Result<Self> {
        let client = build_client(settings)?;
        Ok(Self {
            catalogs: vec![
                Box::new(GitHubCatalog::new(client.clone(), settings)),
                Box::new(HuggingFaceCatalog::new(client.clone(), settings)),
                Box::new(KaggleCatalog::new(client, settings)),
            ],
        })
    }

    /// A registry over arbitrary catalogs (used with test doubles).
    pub fn from_catalogs(catalogs: Vec<Box<dyn Catalog>>) -> Self {
        Self { catalogs }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Catalog> {
        self.catalogs.iter().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build the HTTP client shared by all catalogs.
pub(crate) fn build_client(settings: &CatalogSettings) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(settings.timeout)
        .build()
        .map_err(|e| ProposalGenError::upstream("catalogs", format!("failed to build HTTP client: {e}")))
}

/// Join a path onto a configured base URL.
pub(crate) fn endpoint(base: &url::Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a non-success response to an error for `service`.
pub(crate) async fn check_status(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = body.trim().chars().take(200).collect::<String>();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ProposalGenError::credentials(service, format!("HTTP {status}: {detail}")));
    }
    Err(ProposalGenError::upstream(service, format!("HTTP {status}: {detail}")))
}

/// Settings with every base URL pointed at `uri`.
#[cfg(test)]
pub(crate) fn test_settings(uri: &str) -> CatalogSettings {
    let base = url::Url::parse(uri).unwrap();
    CatalogSettings {
        github_base_url: base.clone(),
        github_token: None,
        huggingface_base_url: base.clone(),
        kaggle_base_url: base,
        kaggle_credentials: None,
        results_per_keyword: 3,
        keywords_per_use_case: 2,
        timeout: std::time::Duration::from_secs(5),
    }
}
