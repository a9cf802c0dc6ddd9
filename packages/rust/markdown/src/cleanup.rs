//! Cleanup pipeline for model-generated Markdown.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! Generated text is embedded inside a larger report, so the passes make it
//! safe to nest: no wrapping fence, headings below the enclosing section, no
//! stray HTML, tidy whitespace.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline. `floor` is the shallowest heading level the
/// text may use once embedded (e.g. 3 inside an `##` section).
pub(crate) fn run_pipeline(md: &str, floor: usize) -> String {
    let mut result = md.replace("\r\n", "\n");

    result = strip_wrapping_fence(&result);
    result = demote_headings(&result, floor);
    result = strip_leftover_html(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Strip a fence wrapping the whole response
// ---------------------------------------------------------------------------

/// Models often answer with the whole document inside ```` ```markdown ````.
fn strip_wrapping_fence(md: &str) -> String {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)\A\s*```(?:markdown|md)?[ \t]*\n(.*?)\n?```\s*\z").expect("valid regex")
    });

    match FENCE_RE.captures(md) {
        // An inner fence means the outer one was not a wrapper.
        Some(caps) if !caps[1].contains("```") => caps[1].to_string(),
        _ => md.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 2: Demote headings beneath the enclosing section
// ---------------------------------------------------------------------------

/// Shift all headings so the shallowest one sits at `floor`, capped at H6.
fn demote_headings(md: &str, floor: usize) -> String {
    static H_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid regex")
    });

    let floor = floor.clamp(1, 6);
    let mut in_code_block = false;
    let mut shallowest = usize::MAX;
    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if !in_code_block {
            if let Some(caps) = H_RE.captures(line) {
                shallowest = shallowest.min(caps[1].len());
            }
        }
    }
    if shallowest == usize::MAX || shallowest >= floor {
        return md.to_string();
    }
    let shift = floor - shallowest;

    let mut in_code_block = false;
    let mut lines: Vec<String> = Vec::new();
    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            lines.push(line.to_string());
            continue;
        }
        match H_RE.captures(line) {
            Some(caps) if !in_code_block => {
                let level = (caps[1].len() + shift).min(6);
                lines.push(format!("{} {}", "#".repeat(level), &caps[2]));
            }
            _ => lines.push(line.to_string()),
        }
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove stray HTML tags, preserving inner text. Code blocks are left alone.
fn strip_leftover_html(md: &str) -> String {
    let mut result = String::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            result.push_str(line);
            result.push('\n');
            continue;
        }

        if in_code_block {
            result.push_str(line);
        } else {
            result.push_str(&strip_html_tags(line));
        }
        result.push('\n');
    }

    if result.ends_with('\n') {
        result.pop();
    }

    result
}

/// Strip HTML tags from a single line, preserving inner text.
fn strip_html_tags(line: &str) -> String {
    static BR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)</?(?:div|span|p|b|i|u|em|strong|font|center|section|article|header|footer|small|sup|sub)(?:\s[^>]*)?>")
            .expect("valid regex")
    });

    let line = BR_RE.replace_all(line, " ");
    HTML_TAG_RE.replace_all(&line, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Normalize whitespace
// ---------------------------------------------------------------------------

fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 5: Collapse blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of blank lines into a single blank line.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

/// Ensure a whole document ends with exactly one newline.
pub(crate) fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
