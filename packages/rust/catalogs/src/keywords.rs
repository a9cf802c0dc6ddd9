//! Search keyword derivation for use cases.
//!
//! Known topics map to catalog-friendly phrases; anything else falls back to
//! the significant words of the title.

use proposalgen_shared::UseCase;

/// Used when nothing else can be derived.
pub const LAST_RESORT_KEYWORD: &str = "machine learning";

/// (trigger words/phrases, keywords to search for). Checked in order.
const TOPICS: &[(&[&str], &[&str])] = &[
    (
        &["code completion", "code", "coding", "developer", "developers"],
        &["code completion", "code generation"],
    ),
    (
        &["chatbot", "chatbots", "customer support", "customer service", "virtual assistant", "conversational"],
        &["chatbot", "customer support"],
    ),
    (
        &["recommendation", "recommendations", "recommender", "personalized", "personalised", "personalization"],
        &["recommendation system", "personalization"],
    ),
    (
        &["forecasting", "forecast", "demand", "sales prediction"],
        &["demand forecasting", "sales prediction"],
    ),
    (
        &["predictive maintenance", "maintenance", "equipment failure"],
        &["predictive maintenance", "anomaly detection"],
    ),
    (
        &["fraud", "anomaly", "anomalies"],
        &["fraud detection", "anomaly detection"],
    ),
    (
        &["cybersecurity", "security", "threat", "threats"],
        &["threat detection", "cybersecurity"],
    ),
    (
        &["computer vision", "image", "images", "visual", "defect", "defects", "quality control", "inspection"],
        &["computer vision", "defect detection"],
    ),
    (
        &["document", "documents", "knowledge base", "retrieval", "semantic search", "rag"],
        &["document search", "retrieval augmented generation"],
    ),
    (
        &["report generation", "reports", "summarization", "summarize", "content generation"],
        &["text summarization", "report generation"],
    ),
    (
        &["optimization", "optimisation", "optimize", "resource allocation", "routing"],
        &["resource optimization", "optimization"],
    ),
];

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "the", "for", "of", "to", "in", "on", "with", "by", "via", "using", "based",
    "ai", "ai-powered", "powered", "driven", "intelligent", "smart", "automated", "system",
    "solution", "platform", "tool", "enhanced", "advanced",
];

/// Derive up to `max` search keywords for a use case. Never returns an empty list.
pub fn derive_keywords(use_case: &UseCase, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut keywords: Vec<String> = Vec::new();

    // Title matches outrank description matches.
    for text in [&use_case.title, &use_case.description] {
        let haystack = normalize(text);
        for (triggers, topic_keywords) in TOPICS {
            if triggers.iter().any(|t| contains_phrase(&haystack, t)) {
                for kw in *topic_keywords {
                    if !keywords.iter().any(|k| k == kw) {
                        keywords.push((*kw).to_string());
                    }
                }
            }
        }
    }

    if keywords.is_empty() {
        let words: Vec<&str> = use_case
            .title
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'))
            .filter(|w| w.len() > 1 && !STOP_WORDS.contains(&w.to_lowercase().as_str()))
            .take(3)
            .collect();
        if !words.is_empty() {
            keywords.push(words.join(" ").to_lowercase());
        }
    }

    if keywords.is_empty() {
        keywords.push(LAST_RESORT_KEYWORD.to_string());
    }

    keywords.truncate(max);
    keywords
}

/// Lowercase and reduce to space-separated words, padded so phrase checks match whole words.
fn normalize(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.contains(&format!(" {phrase} "))
}
