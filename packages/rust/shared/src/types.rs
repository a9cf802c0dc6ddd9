//! Core domain types for proposal generation runs.
//!
//! Each artifact here is produced by exactly one pipeline stage and handed to
//! later stages by shared reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProposalGenError, Result};

/// Current schema version for the `_data.json` / `_run.json` formats.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// The company (and optionally industry) a proposal is written for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    industry: Option<String>,
}

impl Subject {
    /// Build a subject. The name must contain something other than whitespace;
    /// a blank industry is treated as absent.
    pub fn new(name: impl Into<String>, industry: Option<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ProposalGenError::validation("company name must not be empty"));
        }
        let industry = industry
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty());
        Ok(Self { name, industry })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn industry(&self) -> Option<&str> {
        self.industry.as_deref()
    }

    /// Filesystem-safe form of the name, used for output file stems.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Longest slug [`slugify`] returns, in bytes.
pub const MAX_SLUG_LEN: usize = 60;

/// Lowercase, ASCII-alphanumeric words joined by `_`. Never empty.
///
/// Words past [`MAX_SLUG_LEN`] are dropped; a single longer word is cut.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len().min(MAX_SLUG_LEN));
    for word in text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if slug.is_empty() {
            slug.push_str(&word[..word.len().min(MAX_SLUG_LEN)].to_ascii_lowercase());
            continue;
        }
        if slug.len() + 1 + word.len() > MAX_SLUG_LEN {
            break;
        }
        slug.push('_');
        slug.push_str(&word.to_ascii_lowercase());
    }
    if slug.is_empty() {
        slug.push_str("subject");
    }
    slug
}

// ---------------------------------------------------------------------------
// ResearchSummary
// ---------------------------------------------------------------------------

/// A web page the research summary was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

/// Whether the research summary is backed by search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Built from live search results.
    Verified { sources: Vec<SourceRef> },
    /// Produced from the model's own knowledge after search came back empty.
    Unverified,
}

/// Output of the research stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSummary {
    /// Synthesized overview (markdown). Never empty.
    pub overview: String,
    /// Supplied or inferred industry.
    pub industry: String,
    /// AI adoption trends for the industry, when they could be gathered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trends: Option<String>,
    pub provenance: Provenance,
}

impl ResearchSummary {
    pub fn is_verified(&self) -> bool {
        matches!(self.provenance, Provenance::Verified { .. })
    }

    pub fn sources(&self) -> &[SourceRef] {
        match &self.provenance {
            Provenance::Verified { sources } => sources,
            Provenance::Unverified => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// UseCase
// ---------------------------------------------------------------------------

/// One proposed application of AI to the subject's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCase {
    pub title: String,
    pub description: String,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    /// 1 (low) to 5 (high).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

impl UseCase {
    /// A use case with only the three required fields set.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            rationale: rationale.into(),
            category: None,
            technologies: Vec::new(),
            impact: None,
            priority: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Dataset,
    PretrainedModel,
    CodeRepository,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Dataset => "Dataset",
            Self::PretrainedModel => "Pre-trained Model",
            Self::CodeRepository => "Code Repository",
        })
    }
}

/// The catalog a resource was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceSource {
    GitHub,
    HuggingFace,
    Kaggle,
}

impl ResourceSource {
    /// Short lowercase name used in logs and warnings.
    pub fn id(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::HuggingFace => "huggingface",
            Self::Kaggle => "kaggle",
        }
    }
}

impl std::fmt::Display for ResourceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::GitHub => "GitHub",
            Self::HuggingFace => "HuggingFace",
            Self::Kaggle => "Kaggle",
        })
    }
}

/// A dataset, model, or repository relevant to a use case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    /// Identity of the resource within a run.
    pub url: String,
    pub kind: ResourceKind,
    pub source: ResourceSource,
    pub description: String,
    /// Stars, downloads, or votes depending on the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u64>,
}

/// Output of the resource stage: unique resources plus, per use case,
/// the indices of the resources it discovered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCollection {
    /// Unique by URL, in first-discovery order.
    pub resources: Vec<Resource>,
    /// `by_use_case[i]` lists indices into `resources` for use case `i`.
    pub by_use_case: Vec<Vec<usize>>,
}

impl ResourceCollection {
    /// Resources attached to the use case at `index`, in discovery order.
    pub fn for_use_case(&self, index: usize) -> impl Iterator<Item = &Resource> + '_ {
        self.by_use_case
            .get(index)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.resources.get(i))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    UseCases,
    Resources,
    Proposal,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Research => "research",
            Self::UseCases => "use cases",
            Self::Resources => "resources",
            Self::Proposal => "proposal",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// An external service failed or timed out.
    UpstreamUnavailable,
    /// A response could only be partly understood.
    Parse,
    /// A fallback value replaced the normal output.
    Fallback,
}

/// A recoverable problem a stage worked around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageWarning {
    pub stage: Stage,
    pub kind: WarningKind,
    pub message: String,
}

impl StageWarning {
    pub fn new(stage: Stage, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StageWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

/// A stage's artifact plus the warnings collected while producing it.
#[derive(Debug, Clone)]
pub struct Staged<T> {
    pub artifact: T,
    pub warnings: Vec<StageWarning>,
}

impl<T> Staged<T> {
    pub fn clean(artifact: T) -> Self {
        Self {
            artifact,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(artifact: T, warnings: Vec<StageWarning>) -> Self {
        Self { artifact, warnings }
    }
}

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

/// A use case together with the resources found for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedUseCase {
    #[serde(flatten)]
    pub use_case: UseCase,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// The terminal artifact of a run. Built once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub schema_version: u32,
    pub run_id: RunId,
    pub generated_at: DateTime<Utc>,
    pub subject: Subject,
    pub research: ResearchSummary,
    /// In ranking order.
    pub use_cases: Vec<ProposedUseCase>,
    /// Unique resources in discovery order.
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub warnings: Vec<StageWarning>,
}
