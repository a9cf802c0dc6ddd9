//! Use-case generation stage.
//!
//! One generation call produces a JSON array of use cases. The response is
//! parsed into a [`UseCaseParse`] so callers can tell a clean parse from a
//! partial recovery or a total failure. Failures fall back to per-industry
//! templates so the stage never yields an empty list.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{info, instrument, warn};

use proposalgen_shared::{
    ProposalGenError, ResearchSummary, Result, Stage, StageWarning, Staged, Subject, UseCase,
    WarningKind,
};

use crate::llm::TextGenerator;

/// Overview/trend text longer than this is cut before prompting.
const PROMPT_CONTEXT_CHARS: usize = 2_000;

const MISSING_DESCRIPTION: &str = "No description was provided.";
const MISSING_RATIONALE: &str = "No rationale was provided.";

// ---------------------------------------------------------------------------
// Parse result
// ---------------------------------------------------------------------------

/// Outcome of parsing a use-case response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseCaseParse {
    /// Well-formed, nothing to report.
    Complete(Vec<UseCase>),
    /// Some structure was recovered; `issues` lists what was repaired or dropped.
    Partial {
        use_cases: Vec<UseCase>,
        issues: Vec<String>,
        raw: String,
    },
    /// Nothing usable; the raw text is kept for diagnostics.
    Failed { reason: String, raw: String },
}

impl UseCaseParse {
    /// Recovered use cases, if any.
    pub fn use_cases(&self) -> &[UseCase] {
        match self {
            Self::Complete(use_cases) | Self::Partial { use_cases, .. } => use_cases,
            Self::Failed { .. } => &[],
        }
    }
}

/// Parse a model response into at most `expected` use cases, preserving order.
pub fn parse_use_cases(raw: &str, expected: usize) -> UseCaseParse {
    let mut issues = Vec::new();

    let mut use_cases = match extract_json_array(raw) {
        Some(array) => {
            if array.items.is_empty() {
                return UseCaseParse::Failed {
                    reason: "response contained an empty JSON array".into(),
                    raw: raw.to_string(),
                };
            }
            if array.truncated {
                issues.push(format!(
                    "response truncated after {} entries",
                    array.items.len()
                ));
            }
            from_json_items(&array.items, &mut issues)
        }
        None => {
            let recovered = recover_from_text(raw);
            if !recovered.is_empty() {
                issues.push(format!(
                    "no valid JSON array in response; recovered {} use cases from text",
                    recovered.len()
                ));
            }
            recovered
        }
    };

    if use_cases.is_empty() {
        return UseCaseParse::Failed {
            reason: "no use cases could be recovered from the response".into(),
            raw: raw.to_string(),
        };
    }

    if use_cases.len() > expected {
        issues.push(format!(
            "received {} use cases, kept the first {expected}",
            use_cases.len()
        ));
        use_cases.truncate(expected);
    } else if use_cases.len() < expected {
        issues.push(format!(
            "expected {expected} use cases, received {}",
            use_cases.len()
        ));
    }

    if issues.is_empty() {
        UseCaseParse::Complete(use_cases)
    } else {
        UseCaseParse::Partial {
            use_cases,
            issues,
            raw: raw.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Generate `count` use cases for the subject.
#[instrument(skip_all, fields(subject = %subject.name(), count))]
pub async fn generate_use_cases(
    subject: &Subject,
    research: &ResearchSummary,
    llm: &dyn TextGenerator,
    count: usize,
) -> Result<Staged<Vec<UseCase>>> {
    let count = count.max(1);
    let mut warnings = Vec::new();

    let use_cases = match llm.generate(&build_prompt(subject, research, count)).await {
        Ok(generation) => match parse_use_cases(&generation.text, count) {
            UseCaseParse::Complete(use_cases) => use_cases,
            UseCaseParse::Partial {
                use_cases, issues, ..
            } => {
                for issue in issues {
                    warnings.push(StageWarning::new(Stage::UseCases, WarningKind::Parse, issue));
                }
                use_cases
            }
            UseCaseParse::Failed { reason, raw } => {
                warn!(%reason, raw_len = raw.len(), "use case response unusable");
                warnings.push(StageWarning::new(Stage::UseCases, WarningKind::Parse, reason));
                fallback(subject, research, count, &mut warnings)
            }
        },
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(error = %e, "use case generation failed");
            let kind = match e {
                ProposalGenError::Parse { .. } => WarningKind::Parse,
                _ => WarningKind::UpstreamUnavailable,
            };
            warnings.push(StageWarning::new(
                Stage::UseCases,
                kind,
                format!("use case generation failed: {e}"),
            ));
            fallback(subject, research, count, &mut warnings)
        }
    };

    info!(use_cases = use_cases.len(), warnings = warnings.len(), "use case stage complete");
    Ok(Staged::with_warnings(use_cases, warnings))
}

fn fallback(
    subject: &Subject,
    research: &ResearchSummary,
    count: usize,
    warnings: &mut Vec<StageWarning>,
) -> Vec<UseCase> {
    warnings.push(StageWarning::new(
        Stage::UseCases,
        WarningKind::Fallback,
        format!(
            "using standard {} use case templates instead of generated use cases",
            research.industry
        ),
    ));
    template_use_cases(subject.name(), &research.industry, count)
}

/// Prompt asking for exactly `count` use cases as a JSON array.
pub fn build_prompt(subject: &Subject, research: &ResearchSummary, count: usize) -> String {
    let trends = research
        .trends
        .as_deref()
        .map(|t| truncate_chars(t, PROMPT_CONTEXT_CHARS))
        .unwrap_or("No trend data available.");
    format!(
        "You are an AI strategy consultant. Propose exactly {count} AI/ML use cases for the \
         company \"{name}\" in the {industry} industry, ordered from most to least relevant.\n\n\
         Company research:\n{overview}\n\n\
         Industry AI trends:\n{trends}\n\n\
         Requirements:\n\
         - Each use case must address a concrete business problem of {name}.\n\
         - At least one use case must be a generative AI solution (for example document \
         processing, content generation, or automated reporting).\n\
         - Priority is an integer from 1 (low) to 5 (high).\n\n\
         Respond with only a JSON array, no prose, in this exact shape:\n\
         [\n  {{\n    \"title\": \"Concise use case title\",\n    \"description\": \"2-3 sentences \
         describing the solution\",\n    \"rationale\": \"Why this matters for {name}\",\n    \
         \"category\": \"Operations | Customer Experience | Analytics & Insights | Risk & Compliance\",\n    \
         \"technologies\": [\"Specific AI/ML technologies\"],\n    \"impact\": \"Expected business \
         impact\",\n    \"priority\": 4\n  }}\n]",
        name = subject.name(),
        industry = research.industry,
        overview = truncate_chars(&research.overview, PROMPT_CONTEXT_CHARS),
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// JSON parsing
// ---------------------------------------------------------------------------

/// Array elements found in a response.
struct JsonArray {
    items: Vec<Value>,
    /// The array broke off before its closing `]`.
    truncated: bool,
}

/// Find the use-case array in `raw`.
///
/// Each `[` is tried in order and the first array holding an object wins.
/// Failing that, the complete objects at the head of a cut-off array are kept.
fn extract_json_array(raw: &str) -> Option<JsonArray> {
    let starts: Vec<usize> = raw.match_indices('[').map(|(i, _)| i).collect();
    let mut saw_empty = false;

    for &start in &starts {
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Vec<Value>>();
        match stream.next() {
            Some(Ok(items)) if items.iter().any(Value::is_object) => {
                return Some(JsonArray {
                    items,
                    truncated: false,
                });
            }
            Some(Ok(items)) if items.is_empty() => saw_empty = true,
            _ => {}
        }
    }

    starts
        .iter()
        .find_map(|&start| leading_objects(&raw[start + 1..]))
        .map(|items| JsonArray {
            items,
            truncated: true,
        })
        .or_else(|| {
            saw_empty.then(|| JsonArray {
                items: Vec::new(),
                truncated: false,
            })
        })
}

/// Objects that parse, one by one, from the body of an array that never closes.
fn leading_objects(body: &str) -> Option<Vec<Value>> {
    let mut items = Vec::new();
    let mut rest = body.trim_start();

    while rest.starts_with('{') {
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        let Some(Ok(value)) = stream.next() else {
            break;
        };
        let consumed = stream.byte_offset();
        items.push(value);

        rest = rest[consumed..].trim_start();
        match rest.strip_prefix(',') {
            Some(next) => rest = next.trim_start(),
            None => break,
        }
    }

    (!items.is_empty()).then_some(items)
}

fn from_json_items(items: &[Value], issues: &mut Vec<String>) -> Vec<UseCase> {
    let mut use_cases = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let position = i + 1;
        let Some(obj) = item.as_object() else {
            issues.push(format!("entry {position} is not an object; dropped"));
            continue;
        };

        let Some(title) = string_field(obj, &["title", "name", "use_case"]) else {
            issues.push(format!("entry {position} has no title; dropped"));
            continue;
        };

        let description = string_field(obj, &["description", "summary"]).unwrap_or_else(|| {
            issues.push(format!("\"{title}\" has no description"));
            MISSING_DESCRIPTION.to_string()
        });
        let rationale = string_field(obj, &["rationale", "justification", "business_value", "why"])
            .unwrap_or_else(|| {
                issues.push(format!("\"{title}\" has no rationale"));
                MISSING_RATIONALE.to_string()
            });

        use_cases.push(UseCase {
            category: string_field(obj, &["category"]),
            technologies: list_field(obj, &["technologies", "technology", "tech_stack"]),
            impact: string_field(obj, &["impact", "expected_impact", "business_impact"]),
            priority: priority_field(obj, &["priority", "score", "priority_score"]),
            title,
            description,
            rationale,
        });
    }
    use_cases
}

fn string_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn list_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Vec<String> {
    for key in keys {
        match obj.get(*key) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            Some(Value::String(s)) => {
                return s
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}

fn priority_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u8> {
    let value = keys.iter().find_map(|k| obj.get(*k))?;
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "high" => 5.0,
            "medium" => 3.0,
            "low" => 1.0,
            other => other.parse::<f64>().ok()?,
        },
        _ => return None,
    };
    Some(n.round().clamp(1.0, 5.0) as u8)
}

// ---------------------------------------------------------------------------
// Text recovery
// ---------------------------------------------------------------------------

/// Best-effort recovery when the model ignored the JSON instruction.
///
/// Numbered, bold, or heading lines start a new use case; labelled lines fill
/// fields; other lines extend the description.
fn recover_from_text(raw: &str) -> Vec<UseCase> {
    static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)^\s*[-*]?\s*\**\s*(description|rationale|justification|why|impact|expected impact|category|technolog(?:y|ies)|priority)\s*\**\s*:\s*\**\s*(.*)$",
        )
        .expect("valid regex")
    });
    static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"^\s*(?:#{1,6}\s*)?(?:(?i:use case)\s*)?(?:\d{1,2}[.):]\s*)?\*\*([^*]+)\*\*\s*:?\s*(.*)$",
        )
        .expect("valid regex")
    });
    static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?:#{1,6}\s*)?(?:(?i:use case)\s*)?\d{1,2}[.):]\s+(.+)$").expect("valid regex")
    });
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*#{2,6}\s+(.+)$").expect("valid regex"));

    let mut use_cases: Vec<UseCase> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("```") {
            continue;
        }

        if let Some(caps) = FIELD_RE.captures(trimmed) {
            if let Some(current) = use_cases.last_mut() {
                apply_field(current, &caps[1], caps[2].trim());
            }
            continue;
        }

        let title_and_rest = TITLE_RE
            .captures(trimmed)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .or_else(|| NUMBERED_RE.captures(trimmed).map(|c| (c[1].to_string(), String::new())))
            .or_else(|| HEADING_RE.captures(trimmed).map(|c| (c[1].to_string(), String::new())));

        match title_and_rest {
            Some((title, rest)) => {
                let title = clean_title(&title);
                if title.is_empty() {
                    continue;
                }
                let mut uc = UseCase::new(title, String::new(), String::new());
                let rest = rest.trim().trim_start_matches(['-', ':']).trim();
                if !rest.is_empty() {
                    uc.description = rest.to_string();
                }
                use_cases.push(uc);
            }
            None => {
                if let Some(current) = use_cases.last_mut() {
                    let text = trimmed.trim_start_matches(['-', '*']).trim();
                    if !current.description.is_empty() {
                        current.description.push(' ');
                    }
                    current.description.push_str(text);
                }
            }
        }
    }

    for uc in &mut use_cases {
        if uc.description.is_empty() {
            uc.description = MISSING_DESCRIPTION.to_string();
        }
        if uc.rationale.is_empty() {
            uc.rationale = MISSING_RATIONALE.to_string();
        }
    }
    use_cases
}

fn apply_field(uc: &mut UseCase, label: &str, value: &str) {
    let value = value.trim_end_matches("**").trim();
    if value.is_empty() {
        return;
    }
    match label.to_lowercase().as_str() {
        "description" => uc.description = value.to_string(),
        "rationale" | "justification" | "why" => uc.rationale = value.to_string(),
        "impact" | "expected impact" => uc.impact = Some(value.to_string()),
        "category" => uc.category = Some(value.to_string()),
        "priority" => {
            uc.priority = value
                .split(|c: char| !c.is_ascii_digit())
                .find(|s| !s.is_empty())
                .and_then(|s| s.parse::<u8>().ok())
                .map(|p| p.clamp(1, 5));
        }
        _ => {
            uc.technologies = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

fn clean_title(title: &str) -> String {
    title
        .trim()
        .trim_matches('*')
        .trim_end_matches(':')
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Industry templates
// ---------------------------------------------------------------------------

const TECHNOLOGY_TEMPLATES: &[&str] = &[
    "Automated Code Review and Quality Assurance",
    "Intelligent Customer Support Chatbots",
    "Predictive System Maintenance",
    "AI-Powered Development Tools",
    "Automated Testing and QA",
];
const AUTOMOTIVE_TEMPLATES: &[&str] = &[
    "Predictive Maintenance for Manufacturing Equipment",
    "Quality Control with Computer Vision",
    "Supply Chain Optimization",
    "Autonomous Vehicle Development",
    "Customer Experience Personalization",
];
const HEALTHCARE_TEMPLATES: &[&str] = &[
    "Medical Image Analysis and Diagnostics",
    "Electronic Health Record Analysis",
    "Drug Discovery and Development",
    "Patient Risk Prediction",
    "Clinical Decision Support Systems",
];
const FINANCE_TEMPLATES: &[&str] = &[
    "Fraud Detection and Prevention",
    "Algorithmic Trading Systems",
    "Credit Risk Assessment",
    "Customer Service Automation",
    "Regulatory Compliance Monitoring",
];
const RETAIL_TEMPLATES: &[&str] = &[
    "Personalized Product Recommendations",
    "Inventory Management Optimization",
    "Customer Behavior Analytics",
    "Dynamic Pricing Strategies",
    "Supply Chain Forecasting",
];
const MANUFACTURING_TEMPLATES: &[&str] = &[
    "Predictive Equipment Maintenance",
    "Quality Control Automation",
    "Production Planning Optimization",
    "Supply Chain Risk Management",
    "Worker Safety Monitoring",
];

/// (title, description suffix, technologies)
const GENAI_TEMPLATES: &[(&str, &str, &[&str])] = &[
    (
        "Intelligent Document Processing",
        "automatically extract, analyze, and summarize information from documents, contracts, and reports",
        &["Large Language Models", "Document AI", "Natural Language Processing"],
    ),
    (
        "AI-Powered Content Generation",
        "create marketing content, product descriptions, and communication materials",
        &["Large Language Models", "Content Generation"],
    ),
    (
        "Automated Report Generation",
        "generate business reports, summaries, and insights from internal data sources",
        &["Large Language Models", "Data Analytics", "Report Automation"],
    ),
];

fn templates_for(industry: &str) -> &'static [&'static str] {
    let industry = industry.to_lowercase();
    let has = |needles: &[&str]| contains_any(&industry, needles);
    if has(&["health", "medical", "pharma", "hospital"]) {
        HEALTHCARE_TEMPLATES
    } else if has(&["financ", "bank", "insur", "payment"]) {
        FINANCE_TEMPLATES
    } else if has(&["retail", "commerce", "consumer"]) {
        RETAIL_TEMPLATES
    } else if has(&["automotive", "vehicle", "car "]) {
        AUTOMOTIVE_TEMPLATES
    } else if has(&["manufactur", "industrial"]) {
        MANUFACTURING_TEMPLATES
    } else {
        TECHNOLOGY_TEMPLATES
    }
}

/// Standard use cases for an industry: up to `count - 1` industry templates
/// followed by generative-AI templates, so at least one generative-AI use case
/// is always present. Yields at most 8 entries.
pub fn template_use_cases(company: &str, industry: &str, count: usize) -> Vec<UseCase> {
    let count = count.max(1);
    let industry_titles = templates_for(industry);
    let take_industry = (count - 1).min(industry_titles.len());
    let mut use_cases: Vec<UseCase> = industry_titles[..take_industry]
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let mut uc = UseCase::new(
                *title,
                format!("Implement {} for {company}.", title.to_lowercase()),
                format!("A proven AI application in {industry} that addresses a common operational need."),
            );
            uc.category = Some(category_for(title).to_string());
            uc.technologies = technologies_for(title);
            uc.priority = Some(5u8.saturating_sub(i as u8).max(2));
            uc
        })
        .collect();

    for (title, what, technologies) in GENAI_TEMPLATES.iter().take(count - take_industry) {
        let mut uc = UseCase::new(
            *title,
            format!("Deploy a generative AI solution for {company} to {what}."),
            "Generative AI reduces manual effort on high-volume text work and frees staff for higher-value tasks.",
        );
        uc.category = Some("Generative AI".into());
        uc.technologies = technologies.iter().map(|t| (*t).to_string()).collect();
        uc.priority = Some(4);
        use_cases.push(uc);
    }
    use_cases
}

fn category_for(title: &str) -> &'static str {
    let t = title.to_lowercase();
    let has = |needles: &[&str]| contains_any(&t, needles);
    if has(&["customer", "personaliz", "recommend", "chatbot"]) {
        "Customer Experience"
    } else if has(&["fraud", "risk", "compliance", "safety"]) {
        "Risk & Compliance"
    } else if has(&["analytics", "forecast", "pricing", "prediction", "diagnos", "decision"]) {
        "Analytics & Insights"
    } else if has(&["maintenance", "quality", "supply", "inventory", "production", "testing"]) {
        "Operations"
    } else {
        "Innovation"
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn technologies_for(title: &str) -> Vec<String> {
    let t = title.to_lowercase();
    let techs: &[&str] = if t.contains("vision") || t.contains("image") || t.contains("quality control") {
        &["Computer Vision", "Deep Learning"]
    } else if t.contains("chatbot") || t.contains("customer service") || t.contains("code") || t.contains("record") {
        &["Large Language Models", "Natural Language Processing"]
    } else if t.contains("recommend") || t.contains("personaliz") {
        &["Recommender Systems", "Machine Learning"]
    } else {
        &["Machine Learning", "Predictive Analytics"]
    };
    techs.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedGenerator, research_summary};

    const THREE_USE_CASES: &str = r#"Here are the use cases:
```json
[
  {"title": "Demand Forecasting", "description": "Predict store demand.", "rationale": "Fewer stockouts.", "category": "Analytics & Insights", "technologies": ["Time series"], "impact": "5% less waste", "priority": 5},
  {"title": "Shelf Monitoring", "description": "Detect empty shelves.", "rationale": "Recover lost sales.", "priority": "3"},
  {"title": "Support Chatbot", "description": "Answer customer questions.", "rationale": "Lower support cost.", "technologies": "LLM, RAG"}
]
```"#;

    #[test]
    fn well_formed_response_is_complete_and_ordered() {
        let UseCaseParse::Complete(use_cases) = parse_use_cases(THREE_USE_CASES, 3) else {
            panic!("expected a complete parse");
        };
        let titles: Vec<_> = use_cases.iter().map(|u| u.title.as_str()).collect();
        assert_eq!(titles, ["Demand Forecasting", "Shelf Monitoring", "Support Chatbot"]);
        assert_eq!(use_cases[0].priority, Some(5));
        assert_eq!(use_cases[1].priority, Some(3));
        assert_eq!(use_cases[2].technologies, ["LLM", "RAG"]);
        assert_eq!(use_cases[0].impact.as_deref(), Some("5% less waste"));
    }

    #[test]
    fn surplus_entries_are_truncated() {
        let UseCaseParse::Partial { use_cases, issues, .. } = parse_use_cases(THREE_USE_CASES, 2) else {
            panic!("expected a partial parse");
        };
        assert_eq!(use_cases.len(), 2);
        assert_eq!(use_cases[1].title, "Shelf Monitoring");
        assert!(issues[0].contains("kept the first 2"));
    }

    #[test]
    fn shortfall_is_kept_without_padding() {
        let UseCaseParse::Partial { use_cases, issues, .. } = parse_use_cases(THREE_USE_CASES, 5) else {
            panic!("expected a partial parse");
        };
        assert_eq!(use_cases.len(), 3);
        assert!(issues[0].contains("expected 5"));
    }

    #[test]
    fn untitled_entries_are_dropped_and_gaps_filled() {
        let raw = r#"[{"description": "orphan"}, {"title": "Fraud Alerts"}, 42]"#;
        let UseCaseParse::Partial { use_cases, issues, raw: kept } = parse_use_cases(raw, 1) else {
            panic!("expected a partial parse");
        };
        assert_eq!(use_cases.len(), 1);
        assert_eq!(use_cases[0].description, MISSING_DESCRIPTION);
        assert_eq!(use_cases[0].rationale, MISSING_RATIONALE);
        assert!(issues.iter().any(|i| i.contains("entry 1 has no title")));
        assert!(issues.iter().any(|i| i.contains("entry 3 is not an object")));
        assert_eq!(kept, raw);
    }

    #[test]
    fn text_response_is_recovered() {
        let raw = "1. **Personalized Recommendations**: Suggest products per shopper.\n\
                   **Rationale:** Larger baskets.\n\
                   Priority: 4/5\n\n\
                   2. **Demand Forecasting**\n\
                   Predict weekly demand per store.\n\
                   - Category: Analytics\n";
        let UseCaseParse::Partial { use_cases, issues, .. } = parse_use_cases(raw, 2) else {
            panic!("expected a partial parse");
        };
        assert_eq!(use_cases.len(), 2);
        assert_eq!(use_cases[0].title, "Personalized Recommendations");
        assert_eq!(use_cases[0].description, "Suggest products per shopper.");
        assert_eq!(use_cases[0].rationale, "Larger baskets.");
        assert_eq!(use_cases[0].priority, Some(4));
        assert_eq!(use_cases[1].description, "Predict weekly demand per store.");
        assert_eq!(use_cases[1].category.as_deref(), Some("Analytics"));
        assert!(issues[0].contains("recovered 2 use cases from text"));
    }

    #[test]
    fn nothing_recoverable_is_failed() {
        let raw = "I'm sorry, I can't help with that.";
        assert_eq!(
            parse_use_cases(raw, 3),
            UseCaseParse::Failed {
                reason: "no use cases could be recovered from the response".into(),
                raw: raw.into(),
            }
        );
        assert!(matches!(parse_use_cases("[]", 3), UseCaseParse::Failed { .. }));
    }

    #[test]
    fn cut_off_array_keeps_complete_entries() {
        let raw = r#"```json
[
  {"title": "Demand Forecasting", "description": "Predict store demand.", "rationale": "Fewer stockouts."},
  {"title": "Fraud Detection", "description": "Flag risky orders.", "rationale": "Lower chargebacks."},
  {"title": "Support Chat"#;
        let UseCaseParse::Partial { use_cases, issues, .. } = parse_use_cases(raw, 3) else {
            panic!("expected a partial parse");
        };
        let titles: Vec<_> = use_cases.iter().map(|u| u.title.as_str()).collect();
        assert_eq!(titles, ["Demand Forecasting", "Fraud Detection"]);
        assert_eq!(use_cases[1].rationale, "Lower chargebacks.");
        assert!(issues.iter().any(|i| i == "response truncated after 2 entries"));
        assert!(issues.iter().any(|i| i.contains("expected 3")));
    }

    #[test]
    fn brackets_in_leading_prose_are_skipped() {
        let raw = "Here are the use cases [as requested], see [the brief](https://acme.test) [1]:\n\
                   [{\"title\": \"Demand Forecasting\", \"description\": \"Predict store demand.\", \
                   \"rationale\": \"Fewer stockouts.\"}]\n\
                   Let me know [if] you need more.";
        let UseCaseParse::Complete(use_cases) = parse_use_cases(raw, 1) else {
            panic!("expected a complete parse");
        };
        assert_eq!(use_cases[0].title, "Demand Forecasting");
        assert_eq!(use_cases[0].description, "Predict store demand.");
    }

    #[test]
    fn templates_always_include_generative_ai() {
        let use_cases = template_use_cases("Acme Corp", "Retail/E-commerce", 5);
        assert_eq!(use_cases.len(), 5);
        assert_eq!(use_cases[0].title, "Personalized Product Recommendations");
        assert_eq!(use_cases[4].title, "Intelligent Document Processing");
        assert!(use_cases[4].description.contains("Acme Corp"));

        let one = template_use_cases("Acme Corp", "Healthcare", 1);
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].category.as_deref(), Some("Generative AI"));

        assert_eq!(template_use_cases("Acme", "Technology", 20).len(), 8);
    }

    #[tokio::test]
    async fn stage_returns_generated_use_cases_in_order() {
        let subject = Subject::new("Acme Corp", Some("Retail".into())).unwrap();
        let llm = ScriptedGenerator::always(THREE_USE_CASES);

        let staged = generate_use_cases(&subject, &research_summary("Retail"), &llm, 3)
            .await
            .unwrap();

        assert_eq!(staged.artifact.len(), 3);
        assert_eq!(staged.artifact[2].title, "Support Chatbot");
        assert!(staged.warnings.is_empty());
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("exactly 3"));
        assert!(prompt.contains("Acme Corp"));
    }

    #[tokio::test]
    async fn unusable_response_falls_back_to_templates() {
        let subject = Subject::new("Acme Corp", None).unwrap();
        let llm = ScriptedGenerator::always("no idea");

        let staged = generate_use_cases(&subject, &research_summary("Financial Services"), &llm, 3)
            .await
            .unwrap();

        assert_eq!(staged.artifact.len(), 3);
        assert_eq!(staged.artifact[0].title, "Fraud Detection and Prevention");
        assert!(staged.warnings.iter().any(|w| w.kind == WarningKind::Fallback));
    }

    #[tokio::test]
    async fn rejected_key_aborts_stage() {
        let subject = Subject::new("Acme Corp", None).unwrap();
        let llm = ScriptedGenerator::rejecting_credentials();
        let err = generate_use_cases(&subject, &research_summary("Retail"), &llm, 3)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
