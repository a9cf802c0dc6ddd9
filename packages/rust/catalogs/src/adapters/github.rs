//! GitHub repository search.

use async_trait::async_trait;
use proposalgen_shared::{
    CatalogSettings, ProposalGenError, Resource, ResourceKind, ResourceSource, Result, Secret,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Catalog, check_status, endpoint};

const SERVICE: &str = "github";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    #[serde(default)]
    full_name: Option<String>,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: Option<u64>,
}

/// Repositories ranked by stars.
pub struct GitHubCatalog {
    client: Client,
    endpoint: String,
    token: Option<Secret>,
}

impl GitHubCatalog {
    pub fn new(client: Client, settings: &CatalogSettings) -> Self {
        Self {
            client,
            endpoint: endpoint(&settings.github_base_url, "search/repositories"),
            token: settings.github_token.clone(),
        }
    }
}

#[async_trait]
impl Catalog for GitHubCatalog {
    fn source(&self) -> ResourceSource {
        ResourceSource::GitHub
    }

    #[instrument(skip(self), fields(catalog = SERVICE))]
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Resource>> {
        let per_page = limit.to_string();
        let mut request = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/vnd.github+json")
            .query(&[
                ("q", keyword),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProposalGenError::upstream(SERVICE, format!("request failed: {e}")))?;
        let response = check_status(SERVICE, response).await?;

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProposalGenError::upstream(SERVICE, format!("invalid response body: {e}")))?;

        let resources: Vec<Resource> = parsed
            .items
            .into_iter()
            .take(limit)
            .map(|repo| Resource {
                title: repo.full_name.unwrap_or(repo.name),
                url: repo.html_url,
                kind: ResourceKind::CodeRepository,
                source: ResourceSource::GitHub,
                description: repo
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| format!("{keyword} implementation")),
                popularity: repo.stargazers_count,
            })
            .collect();

        debug!(count = resources.len(), "github search complete");
        Ok(resources)
    }
}
