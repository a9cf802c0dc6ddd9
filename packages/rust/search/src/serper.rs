//! Serper (google.serper.dev) search client.

use async_trait::async_trait;
use proposalgen_shared::{ProposalGenError, Result, SearchSettings, Secret};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{SearchHit, WebSearch};

const SERVICE: &str = "serper";

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("proposalgen/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

/// Serper-backed [`WebSearch`].
#[derive(Debug, Clone)]
pub struct SerperSearch {
    client: Client,
    endpoint: String,
    api_key: Secret,
}

impl SerperSearch {
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                ProposalGenError::upstream(SERVICE, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/search", settings.base_url.as_str().trim_end_matches('/')),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl WebSearch for SerperSearch {
    fn name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip(self), fields(service = SERVICE))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose())
            .json(&SearchRequest { q: query, num: limit })
            .send()
            .await
            .map_err(|e| ProposalGenError::upstream(SERVICE, format!("request failed: {e}")))?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            let body = response.text().await.unwrap_or_default();
            return Err(ProposalGenError::credentials(
                SERVICE,
                format!("HTTP {status}: {}", body.trim()),
            ));
        }
        if !status.is_success() {
            return Err(ProposalGenError::upstream(SERVICE, format!("HTTP {status}")));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProposalGenError::upstream(SERVICE, format!("invalid response body: {e}")))?;

        let hits: Vec<SearchHit> = parsed
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .take(limit)
            .map(|r| SearchHit {
                title: r.title,
                link: r.link,
                snippet: r.snippet.unwrap_or_default(),
            })
            .collect();

        debug!(hits = hits.len(), "search complete");
        Ok(hits)
    }
}
