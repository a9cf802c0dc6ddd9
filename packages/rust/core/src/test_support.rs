//! In-memory stand-ins for the external services, shared by the stage tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use proposalgen_catalogs::Catalog;
use proposalgen_search::{SearchHit, WebSearch};
use proposalgen_shared::{
    Provenance, ProposalGenError, ResearchSummary, Resource, ResourceKind, ResourceSource, Result,
    SourceRef,
};

use crate::llm::{Generation, TextGenerator};

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

enum SearchMode {
    Hits(Vec<SearchHit>),
    Fail,
    RejectKey,
}

/// Returns the same hits for every query and records what was asked.
pub struct FakeSearch {
    mode: SearchMode,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    fn with_mode(mode: SearchMode) -> Self {
        Self {
            mode,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hits(hits: &[(&str, &str, &str)]) -> Self {
        Self::with_mode(SearchMode::Hits(
            hits.iter()
                .map(|(title, link, snippet)| SearchHit {
                    title: (*title).into(),
                    link: (*link).into(),
                    snippet: (*snippet).into(),
                })
                .collect(),
        ))
    }

    pub fn empty() -> Self {
        Self::with_mode(SearchMode::Hits(Vec::new()))
    }

    pub fn failing() -> Self {
        Self::with_mode(SearchMode::Fail)
    }

    pub fn rejecting_credentials() -> Self {
        Self::with_mode(SearchMode::RejectKey)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    fn name(&self) -> &str {
        "fake-search"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.mode {
            SearchMode::Hits(hits) => Ok(hits.iter().take(limit).cloned().collect()),
            SearchMode::Fail => Err(ProposalGenError::upstream("serper", "connection reset")),
            SearchMode::RejectKey => Err(ProposalGenError::credentials(
                "serper",
                "HTTP 401: invalid API key",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Language model
// ---------------------------------------------------------------------------

enum Script {
    /// Replies in order; the last reply repeats once the queue is drained.
    Replies(Mutex<VecDeque<String>>, String),
    Fail,
    RejectKey,
}

/// A [`TextGenerator`] with canned replies that records every prompt.
pub struct ScriptedGenerator {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::sequence(&[text])
    }

    /// Reply with each text in turn, repeating the last one.
    pub fn sequence(texts: &[&str]) -> Self {
        let last = texts.last().copied().unwrap_or_default().to_string();
        let queue = texts.iter().map(|t| (*t).to_string()).collect();
        Self::with_script(Script::Replies(Mutex::new(queue), last))
    }

    pub fn failing() -> Self {
        Self::with_script(Script::Fail)
    }

    pub fn rejecting_credentials() -> Self {
        Self::with_script(Script::RejectKey)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<Generation> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.script {
            Script::Replies(queue, last) => {
                let text = queue.lock().unwrap().pop_front().unwrap_or_else(|| last.clone());
                Ok(Generation {
                    tokens_in: prompt.len() as u64 / 4,
                    tokens_out: text.len() as u64 / 4,
                    text,
                    latency_ms: 1,
                })
            }
            Script::Fail => Err(ProposalGenError::upstream("gemini", "HTTP 503: overloaded")),
            Script::RejectKey => Err(ProposalGenError::credentials(
                "gemini",
                "HTTP 403: API_KEY_INVALID",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalogs
// ---------------------------------------------------------------------------

/// Returns canned resources, optionally only for specific keywords, or fails every call.
pub struct FakeCatalog {
    source: ResourceSource,
    /// `(keyword, url)`; a `None` keyword matches every query.
    entries: Vec<(Option<&'static str>, &'static str)>,
    fail: bool,
}

impl FakeCatalog {
    /// The same URLs for every keyword.
    pub fn returning(source: ResourceSource, urls: &[&'static str]) -> Self {
        Self {
            source,
            entries: urls.iter().map(|url| (None, *url)).collect(),
            fail: false,
        }
    }

    /// URLs only for the keyword they are paired with.
    pub fn keyed(source: ResourceSource, entries: &[(&'static str, &'static str)]) -> Self {
        Self {
            source,
            entries: entries.iter().map(|(kw, url)| (Some(*kw), *url)).collect(),
            fail: false,
        }
    }

    pub fn failing(source: ResourceSource) -> Self {
        Self {
            source,
            entries: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    fn source(&self) -> ResourceSource {
        self.source
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Resource>> {
        if self.fail {
            return Err(ProposalGenError::upstream(self.source.id(), "HTTP 500"));
        }
        let kind = match self.source {
            ResourceSource::GitHub => ResourceKind::CodeRepository,
            ResourceSource::HuggingFace => ResourceKind::PretrainedModel,
            ResourceSource::Kaggle => ResourceKind::Dataset,
        };
        Ok(self
            .entries
            .iter()
            .filter(|(kw, _)| kw.is_none_or(|kw| kw == keyword))
            .take(limit)
            .map(|(_, url)| Resource {
                title: url.rsplit('/').next().unwrap_or(url).to_string(),
                url: (*url).to_string(),
                kind,
                source: self.source,
                description: format!("Resource for {keyword}"),
                popularity: Some(42),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

pub fn research_summary(industry: &str) -> ResearchSummary {
    ResearchSummary {
        overview: "Acme Corp operates 240 grocery stores.".into(),
        industry: industry.into(),
        trends: Some("Retailers adopt demand forecasting.".into()),
        provenance: Provenance::Verified {
            sources: vec![SourceRef {
                title: "Acme about".into(),
                url: "https://acme.test/about".into(),
            }],
        },
    }
}
