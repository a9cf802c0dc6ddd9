//! Text generation backend.
//!
//! Every "agent" in the pipeline is a prompt sent through [`TextGenerator`].
//! [`GeminiClient`] talks to the Gemini `generateContent` REST endpoint.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use proposalgen_shared::{GeminiSettings, ProposalGenError, Result, Secret};

const SERVICE: &str = "gemini";

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("proposalgen/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// One completed generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub latency_ms: u64,
}

/// A hosted language model that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier, for logs and the run manifest.
    fn model(&self) -> &str;

    /// Generate a completion for `prompt`.
    ///
    /// Transport failures are `Upstream`, rejected keys are `Credentials`,
    /// and responses without usable text are `Parse`.
    async fn generate(&self, prompt: &str) -> Result<Generation>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

impl ApiError {
    fn is_invalid_key(&self) -> bool {
        self.message.contains("API key not valid")
            || self
                .details
                .iter()
                .any(|d| d.get("reason").and_then(|r| r.as_str()) == Some("API_KEY_INVALID"))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Gemini-backed [`TextGenerator`].
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Secret,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(settings: &GeminiSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                ProposalGenError::upstream(SERVICE, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                settings.base_url.as_str().trim_end_matches('/'),
                settings.model
            ),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let start = Instant::now();
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProposalGenError::upstream(SERVICE, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProposalGenError::parse(format!("gemini response body: {e}")))?;

        let text = extract_text(&parsed)?;
        let usage = parsed.usage_metadata.as_ref();
        let generation = Generation {
            text,
            tokens_in: usage.map_or(0, |u| u.prompt_token_count),
            tokens_out: usage.map_or(0, |u| u.candidates_token_count),
            latency_ms: start.elapsed().as_millis() as u64,
        };

        debug!(
            tokens_in = generation.tokens_in,
            tokens_out = generation.tokens_out,
            latency_ms = generation.latency_ms,
            "generation complete"
        );
        Ok(generation)
    }
}

/// Map an error response to the right error class.
fn classify_error(status: StatusCode, body: &str) -> ProposalGenError {
    let api_error = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = api_error
        .as_ref()
        .map(|e| format!("HTTP {status} {}: {}", e.status, e.message))
        .unwrap_or_else(|| format!("HTTP {status}"));

    let invalid_key = api_error.as_ref().is_some_and(ApiError::is_invalid_key);
    if invalid_key || matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ProposalGenError::credentials(SERVICE, message)
    } else {
        ProposalGenError::upstream(SERVICE, message)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: &GenerateResponse) -> Result<String> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(ProposalGenError::parse(format!("prompt blocked by gemini: {reason}")));
    }

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| ProposalGenError::parse("gemini returned no candidates"))?;

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(ProposalGenError::parse(format!(
            "gemini returned no text (finish reason: {reason})"
        )));
    }
    Ok(text)
}
