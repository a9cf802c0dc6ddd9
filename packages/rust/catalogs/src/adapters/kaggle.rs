//! Kaggle dataset search.
//!
//! The Kaggle API requires credentials. Without them the catalog still answers
//! with a single link to the public dataset search page for the keyword.

use async_trait::async_trait;
use proposalgen_shared::{
    CatalogSettings, KaggleCredentials, ProposalGenError, Resource, ResourceKind, ResourceSource,
    Result,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Catalog, check_status, endpoint};

const SERVICE: &str = "kaggle";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Dataset {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    vote_count: Option<u64>,
}

/// Datasets ranked by votes.
pub struct KaggleCatalog {
    client: Client,
    base: url::Url,
    credentials: Option<KaggleCredentials>,
}

impl KaggleCatalog {
    pub fn new(client: Client, settings: &CatalogSettings) -> Self {
        Self {
            client,
            base: settings.kaggle_base_url.clone(),
            credentials: settings.kaggle_credentials.clone(),
        }
    }

    fn search_page(&self, keyword: &str) -> Result<Resource> {
        let url = url::Url::parse_with_params(&endpoint(&self.base, "datasets"), &[("search", keyword)])
            .map_err(|e| ProposalGenError::validation(format!("invalid kaggle search url: {e}")))?;
        Ok(Resource {
            title: format!("Kaggle datasets for \"{keyword}\""),
            url: url.to_string(),
            kind: ResourceKind::Dataset,
            source: ResourceSource::Kaggle,
            description: format!("Public Kaggle dataset search results for {keyword}"),
            popularity: None,
        })
    }
}

#[async_trait]
impl Catalog for KaggleCatalog {
    fn source(&self) -> ResourceSource {
        ResourceSource::Kaggle
    }

    #[instrument(skip(self), fields(catalog = SERVICE))]
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Resource>> {
        let Some(credentials) = &self.credentials else {
            debug!("no kaggle credentials, linking to search page");
            return Ok(vec![self.search_page(keyword)?]);
        };

        let response = self
            .client
            .get(endpoint(&self.base, "api/v1/datasets/list"))
            .basic_auth(&credentials.username, Some(credentials.key.expose()))
            .query(&[("search", keyword), ("sortBy", "votes")])
            .send()
            .await
            .map_err(|e| ProposalGenError::upstream(SERVICE, format!("request failed: {e}")))?;
        let response = check_status(SERVICE, response).await?;

        let datasets: Vec<Dataset> = response
            .json()
            .await
            .map_err(|e| ProposalGenError::upstream(SERVICE, format!("invalid response body: {e}")))?;

        let resources: Vec<Resource> = datasets
            .into_iter()
            .take(limit)
            .map(|d| Resource {
                url: endpoint(&self.base, &format!("datasets/{}", d.reference)),
                title: d.title.filter(|t| !t.is_empty()).unwrap_or_else(|| d.reference.clone()),
                kind: ResourceKind::Dataset,
                source: ResourceSource::Kaggle,
                description: d
                    .subtitle
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| format!("Dataset for {keyword}")),
                popularity: d.vote_count,
            })
            .collect();

        debug!(count = resources.len(), "kaggle search complete");
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{build_client, test_settings};
    use proposalgen_shared::Secret;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn without_credentials_links_search_page() {
        // No server involved: nothing should be requested.
        let settings = test_settings("https://www.kaggle.com");
        let catalog = KaggleCatalog::new(build_client(&settings).unwrap(), &settings);
        let resources = catalog.search("demand forecasting", 3).await.unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(
            resources[0].url,
            "https://www.kaggle.com/datasets?search=demand+forecasting"
        );
        assert_eq!(resources[0].kind, ResourceKind::Dataset);
    }

    #[tokio::test]
    async fn with_credentials_queries_api() {
        let server = MockServer::start().await;
        let body = std::fs::read_to_string("../../../fixtures/kaggle/datasets_list.json")
            .expect("read kaggle fixture");

        // "alice:secret" base64-encoded
        Mock::given(method("GET"))
            .and(path("/api/v1/datasets/list"))
            .and(query_param("search", "recommendation system"))
            .and(query_param("sortBy", "votes"))
            .and(header("Authorization", "Basic YWxpY2U6c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = test_settings(&server.uri());
        settings.kaggle_credentials = Some(KaggleCredentials {
            username: "alice".into(),
            key: Secret::new("secret"),
        });
        let catalog = KaggleCatalog::new(build_client(&settings).unwrap(), &settings);
        let resources = catalog.search("recommendation system", 1).await.unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].title, "E-Commerce Data");
        assert_eq!(
            resources[0].url,
            format!("{}/datasets/carrie1/ecommerce-data", server.uri())
        );
        assert_eq!(resources[0].popularity, Some(2150));
    }

    #[tokio::test]
    async fn rejected_credentials_surface_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/datasets/list"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut settings = test_settings(&server.uri());
        settings.kaggle_credentials = Some(KaggleCredentials {
            username: "alice".into(),
            key: Secret::new("wrong"),
        });
        let catalog = KaggleCatalog::new(build_client(&settings).unwrap(), &settings);
        let err = catalog.search("chatbot", 3).await.unwrap_err();
        assert!(matches!(err, ProposalGenError::Credentials { .. }));
    }
}
