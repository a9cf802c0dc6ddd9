//! Research stage: web search plus synthesis into a [`ResearchSummary`].
//!
//! When search yields nothing the stage asks the model for a best-effort
//! summary from its own knowledge and marks it unverified.

use std::fmt::Write as _;

use tracing::{info, instrument, warn};

use proposalgen_search::{SearchHit, WebSearch, merge_hits};
use proposalgen_shared::{
    ProposalGenError, Provenance, ResearchSummary, Result, SearchSettings, SourceRef, Stage,
    StageWarning, Staged, Subject, WarningKind,
};

use crate::llm::TextGenerator;

/// Hits kept for the industry trend synthesis.
const MAX_TREND_SNIPPETS: usize = 6;

/// Used when the industry cannot be inferred from the research text.
pub const DEFAULT_INDUSTRY: &str = "Technology";

/// Knobs for the research stage.
#[derive(Debug, Clone, Copy)]
pub struct ResearchOptions {
    pub results_per_query: usize,
    pub max_snippets: usize,
}

impl From<&SearchSettings> for ResearchOptions {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            results_per_query: settings.results_per_query,
            max_snippets: settings.max_snippets,
        }
    }
}

/// Research the subject.
///
/// Only fatal errors (rejected credentials) are returned as `Err`; every
/// other failure degrades the summary and is reported as a warning.
#[instrument(skip_all, fields(subject = %subject.name()))]
pub async fn research(
    subject: &Subject,
    search: &dyn WebSearch,
    llm: &dyn TextGenerator,
    opts: ResearchOptions,
) -> Result<Staged<ResearchSummary>> {
    let mut warnings = Vec::new();

    let queries = company_queries(subject);
    let hits = gather(search, &queries, opts.results_per_query, opts.max_snippets, &mut warnings).await?;
    info!(hits = hits.len(), queries = queries.len(), "company search complete");

    let (overview, provenance) = if hits.is_empty() {
        warnings.push(StageWarning::new(
            Stage::Research,
            WarningKind::Fallback,
            "web search returned no results; the research summary comes from model knowledge and is unverified",
        ));
        let overview = match llm.generate(&fallback_prompt(subject)).await {
            Ok(generation) => generation.text,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "fallback summary failed");
                warnings.push(degraded(&e, "fallback summary failed"));
                placeholder_overview(subject)
            }
        };
        (overview, Provenance::Unverified)
    } else {
        let overview = match llm.generate(&synthesis_prompt(subject, &hits)).await {
            Ok(generation) => generation.text,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "research synthesis failed, using search digest");
                warnings.push(degraded(&e, "research synthesis failed; using raw search snippets"));
                snippet_digest(subject, &hits)
            }
        };
        let sources = hits
            .iter()
            .map(|h| SourceRef {
                title: h.title.clone(),
                url: h.link.clone(),
            })
            .collect();
        (overview, Provenance::Verified { sources })
    };

    let overview = if overview.trim().is_empty() {
        placeholder_overview(subject)
    } else {
        overview.trim().to_string()
    };

    let industry = match subject.industry() {
        Some(industry) => industry.to_string(),
        None => classify_industry(&overview).to_string(),
    };

    let trends = industry_trends(&industry, search, llm, opts, &mut warnings).await?;

    info!(
        %industry,
        verified = matches!(provenance, Provenance::Verified { .. }),
        trends = trends.is_some(),
        warnings = warnings.len(),
        "research stage complete"
    );

    Ok(Staged::with_warnings(
        ResearchSummary {
            overview,
            industry,
            trends,
            provenance,
        },
        warnings,
    ))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Search queries about the company itself.
pub fn company_queries(subject: &Subject) -> Vec<String> {
    let name = subject.name();
    let mut queries = vec![
        format!("{name} business model revenue"),
        format!("{name} main products services"),
        format!("{name} industry sector"),
        format!("what does {name} company do"),
    ];
    if let Some(industry) = subject.industry() {
        for q in &mut queries {
            let _ = write!(q, " {industry}");
        }
    }
    queries
}

/// Search queries about AI adoption in the industry.
pub fn trend_queries(industry: &str) -> Vec<String> {
    vec![
        format!("{industry} AI adoption trends"),
        format!("AI use cases in {industry}"),
    ]
}

/// Run each query in turn, merging hits by link. A failing query becomes a
/// warning unless the failure is fatal.
async fn gather(
    search: &dyn WebSearch,
    queries: &[String],
    per_query: usize,
    cap: usize,
    warnings: &mut Vec<StageWarning>,
) -> Result<Vec<SearchHit>> {
    let mut hits = Vec::new();
    for query in queries {
        if hits.len() >= cap {
            break;
        }
        match search.search(query, per_query).await {
            Ok(found) => {
                merge_hits(&mut hits, found, cap);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(%query, error = %e, "search query failed");
                warnings.push(StageWarning::new(
                    Stage::Research,
                    WarningKind::UpstreamUnavailable,
                    format!("search for \"{query}\" failed: {e}"),
                ));
            }
        }
    }
    Ok(hits)
}

async fn industry_trends(
    industry: &str,
    search: &dyn WebSearch,
    llm: &dyn TextGenerator,
    opts: ResearchOptions,
    warnings: &mut Vec<StageWarning>,
) -> Result<Option<String>> {
    let cap = opts.max_snippets.min(MAX_TREND_SNIPPETS);
    let hits = gather(search, &trend_queries(industry), opts.results_per_query, cap, warnings).await?;
    if hits.is_empty() {
        warnings.push(StageWarning::new(
            Stage::Research,
            WarningKind::Fallback,
            format!("no industry trend data found for {industry}"),
        ));
        return Ok(None);
    }

    match llm.generate(&trends_prompt(industry, &hits)).await {
        Ok(generation) if !generation.text.trim().is_empty() => {
            Ok(Some(generation.text.trim().to_string()))
        }
        Ok(_) => {
            warnings.push(StageWarning::new(
                Stage::Research,
                WarningKind::Parse,
                "industry trend synthesis returned no text",
            ));
            Ok(None)
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(error = %e, "trend synthesis failed");
            warnings.push(degraded(&e, "industry trend synthesis failed"));
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn format_hits(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}\nURL: {}\n{}\n", i + 1, hit.title, hit.link, hit.snippet);
    }
    out
}

fn synthesis_prompt(subject: &Subject, hits: &[SearchHit]) -> String {
    let industry_hint = subject
        .industry()
        .map(|i| format!(" The user describes its industry as \"{i}\"."))
        .unwrap_or_default();
    format!(
        "You are a market research analyst. Using only the search results below, write a concise \
         research summary of the company \"{name}\".{industry_hint}\n\n\
         Use these markdown sections:\n\
         ## Company Overview\n\
         ## Industry Classification\n\
         ## Main Products and Services\n\
         ## Business Model\n\
         ## Strategic Focus\n\n\
         Keep it factual and under 400 words. If the results do not cover a section, say so briefly.\n\n\
         Search results:\n\n{results}",
        name = subject.name(),
        results = format_hits(hits),
    )
}

fn fallback_prompt(subject: &Subject) -> String {
    let industry_hint = subject
        .industry()
        .map(|i| format!(" in the {i} industry"))
        .unwrap_or_default();
    format!(
        "Web search returned no information about the company \"{name}\"{industry_hint}. From your \
         own knowledge, write a best-effort research summary with the markdown sections \
         ## Company Overview, ## Industry Classification, ## Main Products and Services, \
         ## Business Model, and ## Strategic Focus. If you do not know the company, describe a \
         typical company of this kind and say clearly that the details are assumptions.",
        name = subject.name(),
    )
}

fn trends_prompt(industry: &str, hits: &[SearchHit]) -> String {
    format!(
        "Summarize the current AI and machine learning adoption trends in the {industry} industry \
         as a markdown bullet list of 4 to 6 items, followed by a short bullet list of the main \
         adoption challenges. Base the summary on these search results:\n\n{results}",
        results = format_hits(hits),
    )
}

// ---------------------------------------------------------------------------
// Degraded outputs
// ---------------------------------------------------------------------------

fn degraded(e: &ProposalGenError, context: &str) -> StageWarning {
    let kind = match e {
        ProposalGenError::Parse { .. } => WarningKind::Parse,
        _ => WarningKind::UpstreamUnavailable,
    };
    StageWarning::new(Stage::Research, kind, format!("{context}: {e}"))
}

/// Overview assembled directly from search snippets.
fn snippet_digest(subject: &Subject, hits: &[SearchHit]) -> String {
    let mut out = format!(
        "Automated synthesis was unavailable. Search results about {}:\n\n",
        subject.name()
    );
    for hit in hits {
        if hit.snippet.is_empty() {
            let _ = writeln!(out, "- **{}**", hit.title);
        } else {
            let _ = writeln!(out, "- **{}**: {}", hit.title, hit.snippet);
        }
    }
    out
}

fn placeholder_overview(subject: &Subject) -> String {
    format!(
        "No research information could be gathered for {}. The use cases below are based on \
         general industry patterns and should be validated with the company.",
        subject.name()
    )
}

// ---------------------------------------------------------------------------
// Industry classification
// ---------------------------------------------------------------------------

const INDUSTRY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Technology/Cloud Computing", &["cloud", "software", "saas", "platform"]),
    ("Technology/Internet Services", &["search engine", "advertising", "social media", "internet"]),
    ("Manufacturing", &["manufacturing", "factory", "production", "automotive"]),
    ("Financial Services", &["bank", "banking", "financial", "finance", "payment", "payments", "insurance"]),
    ("Healthcare", &["healthcare", "medical", "pharmaceutical", "hospital", "clinical"]),
    ("Retail/E-commerce", &["retail", "retailer", "e-commerce", "ecommerce", "shopping", "consumer"]),
];

/// Infer an industry label from free text.
///
/// Picks the label whose keywords occur most often; ties go to the earlier
/// label. Falls back to [`DEFAULT_INDUSTRY`].
pub fn classify_industry(text: &str) -> &'static str {
    let haystack = text.to_lowercase();
    let mut best = (0usize, DEFAULT_INDUSTRY);
    for (label, keywords) in INDUSTRY_KEYWORDS {
        let score: usize = keywords
            .iter()
            .map(|k| haystack.match_indices(k).count())
            .sum();
        if score > best.0 {
            best = (score, *label);
        }
    }
    best.1
}
