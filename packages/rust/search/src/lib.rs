//! Web search for the research stage.
//!
//! The pipeline only needs "query in, ranked hits out", so the capability is a
//! small trait. [`SerperSearch`] is the production implementation backed by the
//! Serper Google-search API.

mod serper;

use std::collections::HashSet;

use async_trait::async_trait;
use proposalgen_shared::Result;
use serde::{Deserialize, Serialize};

pub use serper::SerperSearch;

// ---------------------------------------------------------------------------
// SearchHit
// ---------------------------------------------------------------------------

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

// ---------------------------------------------------------------------------
// WebSearch
// ---------------------------------------------------------------------------

/// A web search backend.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Short service name used in errors and logs.
    fn name(&self) -> &str;

    /// Run one query, returning at most `limit` hits in rank order.
    ///
    /// An empty result is `Ok(vec![])`. Network failures are
    /// [`ProposalGenError::Upstream`](proposalgen_shared::ProposalGenError::Upstream);
    /// a rejected key is
    /// [`ProposalGenError::Credentials`](proposalgen_shared::ProposalGenError::Credentials).
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Append `incoming` to `hits`, skipping links already present, until `cap` is reached.
///
/// Returns how many hits were added.
pub fn merge_hits(hits: &mut Vec<SearchHit>, incoming: Vec<SearchHit>, cap: usize) -> usize {
    let mut seen: HashSet<String> = hits.iter().map(|h| h.link.clone()).collect();
    let mut added = 0;
    for hit in incoming {
        if hits.len() >= cap {
            break;
        }
        if hit.link.is_empty() || !seen.insert(hit.link.clone()) {
            continue;
        }
        hits.push(hit);
        added += 1;
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(link: &str) -> SearchHit {
        SearchHit {
            title: link.to_uppercase(),
            link: link.into(),
            snippet: String::new(),
        }
    }

    #[test]
    fn merge_skips_duplicate_links() {
        let mut hits = vec![hit("a")];
        let added = merge_hits(&mut hits, vec![hit("a"), hit("b"), hit("b"), hit("c")], 10);
        assert_eq!(added, 2);
        let links: Vec<_> = hits.iter().map(|h| h.link.as_str()).collect();
        assert_eq!(links, ["a", "b", "c"]);
    }

    #[test]
    fn merge_respects_cap() {
        let mut hits = Vec::new();
        merge_hits(&mut hits, vec![hit("a"), hit("b"), hit("c")], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(merge_hits(&mut hits, vec![hit("d")], 2), 0);
    }

    #[test]
    fn merge_drops_empty_links() {
        let mut hits = Vec::new();
        assert_eq!(merge_hits(&mut hits, vec![hit("")], 5), 0);
    }
}
