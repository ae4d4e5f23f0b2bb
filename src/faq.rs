//! FAQ index — the semantic retrieval side of the evidence pair.
//!
//! [`FaqIndex`] is the trait the router consumes: `top_k` returns hits scored
//! with a similarity in [0, 1] where **higher means more relevant**. The
//! in-memory implementation scores by token overlap between the query and the
//! embedded question/answer text, which keeps retrieval deterministic for
//! tests while preserving the scale contract.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::RouterError,
    types::{FaqEntry, FaqHit},
};

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Read-only FAQ retrieval interface.
#[async_trait]
pub trait FaqIndex: Send + Sync {
    /// The `k` most relevant entries for `query`, best first. When
    /// `bank_filter` is set, only entries for that bank (or bank-agnostic
    /// entries) are considered.
    async fn top_k(
        &self,
        query: &str,
        k: usize,
        bank_filter: Option<&str>,
    ) -> Result<Vec<FaqHit>, RouterError>;
}

// ── In-memory implementation ──────────────────────────────────────────────────

struct IndexedEntry {
    id: Uuid,
    entry: FaqEntry,
    tokens: BTreeSet<String>,
}

/// In-memory `FaqIndex` for the binary and tests.
pub struct InMemoryFaqIndex {
    inner: RwLock<Vec<IndexedEntry>>,
}

impl InMemoryFaqIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }

    /// Load an index from a JSON file containing an array of FAQ entries.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RouterError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let entries: Vec<FaqEntry> = serde_json::from_str(&raw)?;
        tracing::info!(
            "FAQ index seeded with {} entries from '{}'",
            entries.len(),
            path.as_ref().display()
        );
        let indexed: Vec<IndexedEntry> = entries.into_iter().map(Self::index_entry).collect();
        Ok(Self {
            inner: RwLock::new(indexed),
        })
    }

    /// Add entries to the index.
    pub async fn upsert(&self, entries: Vec<FaqEntry>) {
        let mut inner = self.inner.write().await;
        for entry in entries {
            inner.push(Self::index_entry(entry));
        }
    }

    fn index_entry(entry: FaqEntry) -> IndexedEntry {
        // Embed question + answer together for full context.
        let text = format!("{} {}", entry.question, entry.answer);
        IndexedEntry {
            id: Uuid::new_v4(),
            tokens: tokenize(&text),
            entry,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl Default for InMemoryFaqIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaqIndex for InMemoryFaqIndex {
    async fn top_k(
        &self,
        query: &str,
        k: usize,
        bank_filter: Option<&str>,
    ) -> Result<Vec<FaqHit>, RouterError> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let inner = self.inner.read().await;
        let mut scored: Vec<FaqHit> = inner
            .iter()
            .filter(|ie| match bank_filter {
                None => true,
                Some(b) => {
                    ie.entry.bank.eq_ignore_ascii_case(b)
                        || ie.entry.bank.is_empty()
                        || ie.entry.bank.eq_ignore_ascii_case("general")
                }
            })
            .map(|ie| FaqHit {
                similarity: overlap_similarity(&query_tokens, &ie.tokens),
                entry: ie.entry.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}

// ── Scoring helpers ───────────────────────────────────────────────────────────

/// Lowercased alphanumeric word set.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_ascii_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

/// Jaccard overlap of two token sets, in [0, 1]. Higher = more similar.
fn overlap_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}
