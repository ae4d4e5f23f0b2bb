//! Evidence retrieval — the two concurrent backend probes.
//!
//! One exact-count query against the product store and one top-1 query
//! against the FAQ index run in parallel, each under its own deadline.
//! A transient failure is retried once after a short backoff; after that
//! the missing value degrades to its sentinel and routing continues.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::{
    catalog::ProductStore,
    config::{DB_COUNT_UNKNOWN, EVIDENCE_RETRY_BACKOFF_MS},
    faq::FaqIndex,
    types::{Evidence, FaqHit, Scope},
};

/// Gathers evidence for one utterance.
pub struct EvidenceRetriever {
    store: Arc<dyn ProductStore>,
    faq: Arc<dyn FaqIndex>,
    deadline: Duration,
}

impl EvidenceRetriever {
    pub fn new(store: Arc<dyn ProductStore>, faq: Arc<dyn FaqIndex>, deadline: Duration) -> Self {
        Self {
            store,
            faq,
            deadline,
        }
    }

    /// Probe both backends concurrently and join.
    pub async fn gather(&self, scope: &Scope, utterance: &str) -> Evidence {
        let (db_count, faq_top) = tokio::join!(
            self.count_evidence(scope),
            self.faq_evidence(scope, utterance)
        );

        let faq_top_similarity = faq_top.as_ref().map(|h| h.similarity).unwrap_or(0.0);
        debug!(
            "Evidence: db_count={}, faq_similarity={:.2}",
            db_count, faq_top_similarity
        );

        Evidence {
            db_count,
            faq_top_similarity,
            faq_top,
        }
    }

    /// Count under the resolved scope.
    ///
    /// With both bank and category the count is exact; with one dimension it
    /// is the partial aggregate; with neither it is omitted entirely so the
    /// validator cannot route to COUNT on a count signal alone.
    async fn count_evidence(&self, scope: &Scope) -> i64 {
        if scope.bank.is_none() && scope.category.is_none() {
            return DB_COUNT_UNKNOWN;
        }

        for attempt in 0..2 {
            let call = self
                .store
                .count(scope.bank.as_deref(), scope.category.as_deref(), None);
            match timeout(self.deadline, call).await {
                Ok(Ok(n)) => return n as i64,
                Ok(Err(e)) => {
                    warn!("Catalog count failed (attempt {}): {}", attempt + 1, e)
                }
                Err(_) => warn!("Catalog count timed out (attempt {})", attempt + 1),
            }
            if attempt == 0 {
                sleep(Duration::from_millis(EVIDENCE_RETRY_BACKOFF_MS)).await;
            }
        }
        DB_COUNT_UNKNOWN
    }

    async fn faq_evidence(&self, scope: &Scope, utterance: &str) -> Option<FaqHit> {
        // An inherited bank narrows the catalog count but should not hide
        // bank-agnostic FAQ answers.
        let bank_filter = if scope.bank_inherited {
            None
        } else {
            scope.bank.as_deref()
        };

        for attempt in 0..2 {
            match timeout(self.deadline, self.faq.top_k(utterance, 1, bank_filter)).await {
                Ok(Ok(hits)) => return hits.into_iter().next(),
                Ok(Err(e)) => warn!("FAQ probe failed (attempt {}): {}", attempt + 1, e),
                Err(_) => warn!("FAQ probe timed out (attempt {})", attempt + 1),
            }
            if attempt == 0 {
                sleep(Duration::from_millis(EVIDENCE_RETRY_BACKOFF_MS)).await;
            }
        }
        None
    }
}
