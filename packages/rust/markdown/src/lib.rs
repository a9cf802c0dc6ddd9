//! Markdown rendering for proposals and resource listings.
//!
//! Rendering is pure formatting over a finished [`Proposal`]. Any model-written
//! text is run through the cleanup passes in [`cleanup`] before it is embedded.

mod cleanup;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use proposalgen_shared::{Proposal, ProposedUseCase, Provenance, Resource, ResourceSource};
use tracing::{debug, instrument};

// ---------------------------------------------------------------------------
// Static report sections
// ---------------------------------------------------------------------------

const TECHNICAL_COMPLEXITY: &str = "Medium to High";
const ESTIMATED_TIMELINE: &str = "3-6 months per use case";
const RESOURCE_REQUIREMENTS: &str =
    "Cloud infrastructure, AI/ML expertise, data engineering capabilities";
const SUCCESS_FACTORS: &[&str] = &[
    "Strong data governance",
    "Executive sponsorship",
    "Change management",
    "Continuous monitoring",
];
const DELIVERY_PHASES: &[&str] = &[
    "**Phase 1**: Data collection and preparation (2-4 weeks)",
    "**Phase 2**: Model development and training (4-8 weeks)",
    "**Phase 3**: Testing and validation (2-4 weeks)",
    "**Phase 4**: Deployment and monitoring (2-3 weeks)",
];
const NEXT_STEPS: &[&str] = &[
    "Conduct a detailed technical feasibility assessment for the top 3 use cases",
    "Develop a proof of concept for the highest-priority use case",
    "Establish an AI center of excellence and a cross-functional team",
    "Begin data collection, preparation, and governance framework setup",
    "Define success metrics and an ROI measurement framework",
];

/// Clean model-generated Markdown for embedding beneath a heading of level `floor - 1`.
pub fn clean_generated(text: &str, floor: usize) -> String {
    cleanup::run_pipeline(text, floor)
}

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

/// Render the full proposal document.
#[instrument(skip_all, fields(subject = %proposal.subject.name(), use_cases = proposal.use_cases.len()))]
pub fn render_proposal(proposal: &Proposal) -> String {
    let name = proposal.subject.name();
    let research = &proposal.research;
    let mut out = String::new();

    let _ = writeln!(out, "# AI Use Case Proposal: {name}\n");
    let _ = writeln!(
        out,
        "_Generated {} (run `{}`)_\n",
        proposal.generated_at.format("%Y-%m-%d %H:%M UTC"),
        proposal.run_id
    );

    // Executive summary
    out.push_str("## Executive Summary\n\n");
    let _ = writeln!(out, "- **Company:** {name}");
    let _ = writeln!(out, "- **Industry:** {}", research.industry);
    let _ = writeln!(out, "- **Date:** {}", proposal.generated_at.format("%Y-%m-%d"));
    let _ = writeln!(out, "- **Use cases proposed:** {}", proposal.use_cases.len());
    let _ = writeln!(out, "- **Resources identified:** {}", proposal.resources.len());
    let basis = match &research.provenance {
        Provenance::Verified { sources } => {
            format!("web research ({} sources)", sources.len())
        }
        Provenance::Unverified => "model knowledge only (unverified)".to_string(),
    };
    let _ = writeln!(out, "- **Research basis:** {basis}\n");
    if !research.is_verified() {
        out.push_str(
            "> **Note:** web search returned no usable results for this company. The research \
             summary below was produced from the language model's own knowledge and has not \
             been verified against current sources.\n\n",
        );
    }

    out.push_str("## Company Research\n\n");
    out.push_str(&clean_generated(&research.overview, 3));
    out.push_str("\n\n");

    out.push_str("## Industry AI Trends\n\n");
    match research.trends.as_deref().map(|t| clean_generated(t, 3)) {
        Some(trends) if !trends.is_empty() => out.push_str(&trends),
        _ => out.push_str("_No industry trend data was gathered for this run._"),
    }
    out.push_str("\n\n");

    out.push_str("## Proposed Use Cases\n\n");
    for (i, proposed) in proposal.use_cases.iter().enumerate() {
        render_use_case(&mut out, i + 1, proposed);
    }

    render_feasibility(&mut out, &research.industry);

    out.push_str("## Next Steps\n\n");
    for (i, step) in NEXT_STEPS.iter().enumerate() {
        let _ = writeln!(out, "{}. {step}", i + 1);
    }
    out.push('\n');

    out.push_str("## References\n\n");
    let sources = research.sources();
    if sources.is_empty() {
        out.push_str("_No external sources were consulted (unverified research summary)._\n");
    } else {
        for (i, source) in sources.iter().enumerate() {
            let _ = writeln!(out, "{}. [{}]({})", i + 1, escape_link_text(&source.title), source.url);
        }
    }
    out.push('\n');

    if !proposal.warnings.is_empty() {
        out.push_str("## Run Notes\n\n");
        out.push_str("This proposal was produced with degraded inputs:\n\n");
        for warning in &proposal.warnings {
            let _ = writeln!(out, "- {warning}");
        }
        out.push('\n');
    }

    let rendered = cleanup::ensure_trailing_newline(&out);
    debug!(bytes = rendered.len(), "proposal rendered");
    rendered
}

fn render_use_case(out: &mut String, number: usize, proposed: &ProposedUseCase) {
    let uc = &proposed.use_case;
    let _ = writeln!(out, "### {number}. {}\n", uc.title);
    let _ = writeln!(out, "**Description:** {}\n", clean_generated(&uc.description, 4));
    let _ = writeln!(out, "**Rationale:** {}\n", clean_generated(&uc.rationale, 4));

    let mut details = Vec::new();
    if let Some(category) = &uc.category {
        details.push(format!("- **Category:** {category}"));
    }
    if !uc.technologies.is_empty() {
        details.push(format!("- **Technologies:** {}", uc.technologies.join(", ")));
    }
    if let Some(impact) = &uc.impact {
        details.push(format!("- **Expected impact:** {impact}"));
    }
    if let Some(priority) = uc.priority {
        details.push(format!("- **Priority:** {} ({priority}/5)", stars(priority)));
    }
    if !details.is_empty() {
        out.push_str(&details.join("\n"));
        out.push_str("\n\n");
    }

    out.push_str("**Resources:**\n\n");
    if proposed.resources.is_empty() {
        out.push_str("_No matching resources were found._\n\n");
        return;
    }
    for resource in &proposed.resources {
        let _ = writeln!(
            out,
            "- [{}]({}) ({}, {})",
            escape_link_text(&resource.title),
            resource.url,
            resource.source,
            resource.kind
        );
    }
    out.push('\n');
}

fn render_feasibility(out: &mut String, industry: &str) {
    out.push_str("## Implementation Feasibility\n\n");
    let _ = writeln!(out, "- **Technical complexity:** {TECHNICAL_COMPLEXITY}");
    let _ = writeln!(out, "- **Estimated timeline:** {ESTIMATED_TIMELINE}");
    let _ = writeln!(out, "- **Resource requirements:** {RESOURCE_REQUIREMENTS}\n");

    out.push_str("### Delivery Phases\n\n");
    for phase in DELIVERY_PHASES {
        let _ = writeln!(out, "- {phase}");
    }
    out.push('\n');

    out.push_str("### Success Factors\n\n");
    for factor in SUCCESS_FACTORS {
        let _ = writeln!(out, "- {factor}");
    }
    out.push('\n');

    out.push_str("### Expected Benefits\n\n");
    out.push_str("- **Operational efficiency:** 20-35% improvement in process efficiency\n");
    out.push_str("- **Cost reduction:** 15-25% reduction in operational costs\n");
    out.push_str("- **Customer satisfaction:** 25-40% improvement in customer experience metrics\n");
    let _ = writeln!(
        out,
        "- **Competitive advantage:** early-mover position in AI adoption within the {industry} segment\n"
    );
}

// ---------------------------------------------------------------------------
// Resource listing
// ---------------------------------------------------------------------------

/// Render the standalone resource listing, grouped by source.
///
/// Every entry is a heading followed by URL, Type, Source, Description, and
/// Use Cases lines.
#[instrument(skip_all, fields(resources = proposal.resources.len()))]
pub fn render_resource_listing(proposal: &Proposal) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# AI/ML Resources for {}\n", proposal.subject.name());
    let _ = writeln!(
        out,
        "_Generated {}. {} unique resources across {} use cases._\n",
        proposal.generated_at.format("%Y-%m-%d %H:%M UTC"),
        proposal.resources.len(),
        proposal.use_cases.len()
    );

    if proposal.resources.is_empty() {
        out.push_str("_No resources were found for this run._\n");
        return cleanup::ensure_trailing_newline(&out);
    }

    let mut by_source: BTreeMap<ResourceSource, Vec<&Resource>> = BTreeMap::new();
    for resource in &proposal.resources {
        by_source.entry(resource.source).or_default().push(resource);
    }

    for (source, resources) in by_source {
        let _ = writeln!(out, "## {source}\n");
        for resource in resources {
            let _ = writeln!(out, "### {}\n", resource.title);
            let _ = writeln!(out, "- **URL:** {}", resource.url);
            let _ = writeln!(out, "- **Type:** {}", resource.kind);
            let _ = writeln!(out, "- **Source:** {}", resource.source);
            let _ = writeln!(out, "- **Description:** {}", resource.description);
            let used_by = use_case_titles(proposal, &resource.url);
            if !used_by.is_empty() {
                let _ = writeln!(out, "- **Use Cases:** {}", used_by.join("; "));
            }
            if let Some(count) = resource.popularity {
                let _ = writeln!(
                    out,
                    "- **Popularity:** {} {}",
                    group_thousands(count),
                    popularity_unit(resource.source)
                );
            }
            out.push('\n');
        }
    }

    cleanup::ensure_trailing_newline(&out)
}

fn use_case_titles<'a>(proposal: &'a Proposal, url: &str) -> Vec<&'a str> {
    proposal
        .use_cases
        .iter()
        .filter(|p| p.resources.iter().any(|r| r.url == url))
        .map(|p| p.use_case.title.as_str())
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn stars(priority: u8) -> String {
    let filled = usize::from(priority.clamp(1, 5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

fn popularity_unit(source: ResourceSource) -> &'static str {
    match source {
        ResourceSource::GitHub => "stars",
        ResourceSource::HuggingFace => "downloads",
        ResourceSource::Kaggle => "votes",
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn escape_link_text(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}
