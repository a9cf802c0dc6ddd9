//! HuggingFace Hub model search.

use async_trait::async_trait;
use proposalgen_shared::{
    CatalogSettings, ProposalGenError, Resource, ResourceKind, ResourceSource, Result,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Catalog, check_status, endpoint};

const SERVICE: &str = "huggingface";

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "modelId")]
    model_id: Option<String>,
    #[serde(default)]
    pipeline_tag: Option<String>,
    #[serde(default)]
    downloads: Option<u64>,
}

/// Models ranked by downloads.
pub struct HuggingFaceCatalog {
    client: Client,
    base: url::Url,
}

impl HuggingFaceCatalog {
    pub fn new(client: Client, settings: &CatalogSettings) -> Self {
        Self {
            client,
            base: settings.huggingface_base_url.clone(),
        }
    }
}

#[async_trait]
impl Catalog for HuggingFaceCatalog {
    fn source(&self) -> ResourceSource {
        ResourceSource::HuggingFace
    }

    #[instrument(skip(self), fields(catalog = SERVICE))]
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Resource>> {
        let limit_param = limit.to_string();
        let response = self
            .client
            .get(endpoint(&self.base, "api/models"))
            .query(&[
                ("search", keyword),
                ("sort", "downloads"),
                ("direction", "-1"),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProposalGenError::upstream(SERVICE, format!("request failed: {e}")))?;
        let response = check_status(SERVICE, response).await?;

        let models: Vec<ModelInfo> = response
            .json()
            .await
            .map_err(|e| ProposalGenError::upstream(SERVICE, format!("invalid response body: {e}")))?;

        let resources: Vec<Resource> = models
            .into_iter()
            .filter_map(|m| {
                let id = m.id.or(m.model_id)?;
                let description = match &m.pipeline_tag {
                    Some(tag) => format!("Pre-trained {} model", tag.replace('-', " ")),
                    None => format!("Pre-trained model related to {keyword}"),
                };
                Some(Resource {
                    url: endpoint(&self.base, &id),
                    title: id,
                    kind: ResourceKind::PretrainedModel,
                    source: ResourceSource::HuggingFace,
                    description,
                    popularity: m.downloads,
                })
            })
            .take(limit)
            .collect();

        debug!(count = resources.len(), "huggingface search complete");
        Ok(resources)
    }
}
