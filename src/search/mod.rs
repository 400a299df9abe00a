//! Hybrid search
//!
//! Three lanes feed every query: exact substring matches, full-text
//! matches, and cosine similarity over stored embeddings. Lanes accumulate
//! across the expanded terms, then merge with strict priority
//! EXACT > FTS > SEMANTIC, deduplicated by item id.

use crate::pipeline::Services;
use crate::store::{ClipboardItem, Store, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub mod expansion;

pub use expansion::expand;

/// Semantic search needs at least this many characters to be meaningful
const MIN_SEMANTIC_QUERY_LEN: usize = 3;

/// One result lane: insertion-ordered, deduplicated, capped
struct Lane {
    items: Vec<ClipboardItem>,
    seen: HashSet<i64>,
    cap: usize,
}

impl Lane {
    fn new(cap: usize) -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            cap,
        }
    }

    fn full(&self) -> bool {
        self.items.len() >= self.cap
    }

    fn extend(&mut self, items: Vec<ClipboardItem>) {
        for item in items {
            if self.full() {
                break;
            }
            if self.seen.insert(item.id) {
                self.items.push(item);
            }
        }
    }
}

/// Hybrid search engine over the store
pub struct SearchEngine {
    store: Arc<Store>,
    services: Arc<Services>,
    lane_factor: usize,
}

impl SearchEngine {
    /// Create an engine; `lane_factor` scales the per-lane candidate cap
    pub fn new(store: Arc<Store>, services: Arc<Services>, lane_factor: usize) -> Self {
        Self {
            store,
            services,
            lane_factor: lane_factor.max(1),
        }
    }

    /// Run a hybrid search. An empty query returns the most recent items.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ClipboardItem>, StoreError> {
        if query.trim().is_empty() {
            return self.store.get_recent(limit).await;
        }

        let terms = expand(query);
        let lane_cap = limit.saturating_mul(self.lane_factor).max(limit);

        let mut exact_lane = Lane::new(lane_cap);
        let mut fts_lane = Lane::new(lane_cap);
        let mut semantic_lane = Lane::new(lane_cap);

        for term in &terms {
            if !exact_lane.full() {
                let mut hits = self.store.search_exact(term, lane_cap).await?;
                rank_exact(&mut hits, term);
                exact_lane.extend(hits);
            }

            if !fts_lane.full() {
                fts_lane.extend(self.fts_lookup(term, lane_cap).await);
            }

            if !semantic_lane.full() && term.chars().count() >= MIN_SEMANTIC_QUERY_LEN {
                semantic_lane.extend(self.semantic_lookup(term, limit).await?);
            }
        }

        // Strict priority merge: exact beats FTS beats semantic
        let mut merged = Vec::with_capacity(limit);
        let mut seen = HashSet::new();
        for item in exact_lane
            .items
            .into_iter()
            .chain(fts_lane.items)
            .chain(semantic_lane.items)
        {
            if merged.len() >= limit {
                break;
            }
            if seen.insert(item.id) {
                merged.push(item);
            }
        }

        Ok(merged)
    }

    /// FTS lookup for one term. Multi-word terms run as a quoted phrase
    /// first and fall back to the raw term when the phrase matches nothing.
    /// FTS syntax errors count as no matches.
    async fn fts_lookup(&self, term: &str, cap: usize) -> Vec<ClipboardItem> {
        let phrase = term
            .contains(char::is_whitespace)
            .then(|| format!("\"{}\"", term.replace('"', "")));

        if let Some(phrase) = phrase {
            match self.store.search_fts(&phrase, cap).await {
                Ok(hits) if !hits.is_empty() => return hits,
                Ok(_) => {}
                Err(e) => debug!("FTS phrase query failed: {}", e),
            }
        }

        match self.store.search_fts(term, cap).await {
            Ok(hits) => hits,
            Err(e) => {
                debug!("FTS query failed for {:?}: {}", term, e);
                Vec::new()
            }
        }
    }

    /// Semantic lookup for one term; requires the embedding service
    async fn semantic_lookup(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<ClipboardItem>, StoreError> {
        let Some(embedder) = self.services.embedder() else {
            return Ok(Vec::new());
        };

        let query = term.to_string();
        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&query))
            .await
            .unwrap_or_default();
        if embedding.is_empty() {
            return Ok(Vec::new());
        }

        self.store.search_by_embedding(&embedding, limit).await
    }
}

/// Re-rank exact-lane hits: whole-text equality first, prefix matches
/// second, everything else third. The store returns hits newest-first and
/// the stable sort preserves that order inside each class.
fn rank_exact(items: &mut [ClipboardItem], term: &str) {
    items.sort_by_key(|item| {
        let text = item.searchable_text().to_lowercase();
        if text == term {
            0u8
        } else if text.starts_with(term) {
            1
        } else {
            2
        }
    });
}
