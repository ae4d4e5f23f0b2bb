//! Tests for [`bank_assistant::evidence`] — parallel probes, deadlines,
//! retries, and sentinel degradation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bank_assistant::catalog::{InMemoryCatalog, ProductStore};
use bank_assistant::error::RouterError;
use bank_assistant::evidence::EvidenceRetriever;
use bank_assistant::faq::FaqIndex;
use bank_assistant::types::{FaqEntry, FaqHit, Product, Scope};

// ── Fakes ─────────────────────────────────────────────────────────────────────

/// Store whose count always fails, recording attempts.
struct FailingStore {
    attempts: AtomicU32,
}

#[async_trait]
impl ProductStore for FailingStore {
    async fn count(
        &self,
        _bank: Option<&str>,
        _category: Option<&str>,
        _product_name: Option<&str>,
    ) -> Result<u64, RouterError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(RouterError::Catalog("connection refused".to_string()))
    }

    async fn list(&self, _bank: &str, _category: &str) -> Result<Vec<Product>, RouterError> {
        Ok(Vec::new())
    }

    async fn get(&self, _bank: &str, _name: &str) -> Result<Option<Product>, RouterError> {
        Ok(None)
    }

    async fn distinct_banks(&self) -> Result<Vec<String>, RouterError> {
        Ok(Vec::new())
    }

    async fn distinct_categories(&self) -> Result<Vec<String>, RouterError> {
        Ok(Vec::new())
    }

    async fn distinct_product_names(&self) -> Result<Vec<(String, String)>, RouterError> {
        Ok(Vec::new())
    }
}

/// Store whose count sleeps past any reasonable deadline.
struct SlowStore {
    attempts: AtomicU32,
    delay: Duration,
}

#[async_trait]
impl ProductStore for SlowStore {
    async fn count(
        &self,
        _bank: Option<&str>,
        _category: Option<&str>,
        _product_name: Option<&str>,
    ) -> Result<u64, RouterError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(99)
    }

    async fn list(&self, _bank: &str, _category: &str) -> Result<Vec<Product>, RouterError> {
        Ok(Vec::new())
    }

    async fn get(&self, _bank: &str, _name: &str) -> Result<Option<Product>, RouterError> {
        Ok(None)
    }

    async fn distinct_banks(&self) -> Result<Vec<String>, RouterError> {
        Ok(Vec::new())
    }

    async fn distinct_categories(&self) -> Result<Vec<String>, RouterError> {
        Ok(Vec::new())
    }

    async fn distinct_product_names(&self) -> Result<Vec<(String, String)>, RouterError> {
        Ok(Vec::new())
    }
}

struct StaticFaq {
    similarity: f32,
}

#[async_trait]
impl FaqIndex for StaticFaq {
    async fn top_k(
        &self,
        _query: &str,
        _k: usize,
        _bank_filter: Option<&str>,
    ) -> Result<Vec<FaqHit>, RouterError> {
        Ok(vec![FaqHit {
            similarity: self.similarity,
            entry: FaqEntry {
                bank: "General".to_string(),
                category: "General".to_string(),
                question: "q".to_string(),
                answer: "a".to_string(),
            },
        }])
    }
}

struct FailingFaq;

#[async_trait]
impl FaqIndex for FailingFaq {
    async fn top_k(
        &self,
        _query: &str,
        _k: usize,
        _bank_filter: Option<&str>,
    ) -> Result<Vec<FaqHit>, RouterError> {
        Err(RouterError::FaqIndex("index unavailable".to_string()))
    }
}

fn scoped(bank: Option<&str>, category: Option<&str>) -> Scope {
    Scope {
        bank: bank.map(String::from),
        alt_banks: Vec::new(),
        category: category.map(String::from),
        product_name: None,
        bank_inherited: false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn happy_path_returns_both_values() {
    let store = Arc::new(InMemoryCatalog::with_products(vec![Product {
        bank: "SBI".to_string(),
        category: "Credit Card".to_string(),
        name: "SBI Elite".to_string(),
        summary: None,
        attributes: serde_json::Map::new(),
    }]));
    let retriever = EvidenceRetriever::new(
        store,
        Arc::new(StaticFaq { similarity: 0.42 }),
        Duration::from_millis(100),
    );

    let ev = retriever
        .gather(&scoped(Some("SBI"), Some("Credit Card")), "how many")
        .await;
    assert_eq!(ev.db_count, 1);
    assert!((ev.faq_top_similarity - 0.42).abs() < f32::EPSILON);
    assert!(ev.faq_top.is_some());
}

#[tokio::test]
async fn unscoped_query_skips_the_count_entirely() {
    let store = Arc::new(FailingStore {
        attempts: AtomicU32::new(0),
    });
    let retriever = EvidenceRetriever::new(
        store.clone(),
        Arc::new(StaticFaq { similarity: 0.2 }),
        Duration::from_millis(100),
    );

    let ev = retriever.gather(&scoped(None, None), "how many things").await;
    assert_eq!(ev.db_count, -1);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_count_retries_once_then_degrades() {
    let store = Arc::new(FailingStore {
        attempts: AtomicU32::new(0),
    });
    let retriever = EvidenceRetriever::new(
        store.clone(),
        Arc::new(StaticFaq { similarity: 0.2 }),
        Duration::from_millis(100),
    );

    let ev = retriever
        .gather(&scoped(Some("SBI"), None), "how many sbi products")
        .await;
    assert_eq!(ev.db_count, -1);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 2, "one retry only");
}

#[tokio::test]
async fn slow_count_times_out_to_sentinel() {
    let store = Arc::new(SlowStore {
        attempts: AtomicU32::new(0),
        delay: Duration::from_millis(200),
    });
    let retriever = EvidenceRetriever::new(
        store.clone(),
        Arc::new(StaticFaq { similarity: 0.2 }),
        Duration::from_millis(10),
    );

    let ev = retriever
        .gather(&scoped(Some("SBI"), None), "how many sbi products")
        .await;
    assert_eq!(ev.db_count, -1);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failing_faq_degrades_to_zero_similarity() {
    let store = Arc::new(InMemoryCatalog::new());
    let retriever =
        EvidenceRetriever::new(store, Arc::new(FailingFaq), Duration::from_millis(100));

    let ev = retriever
        .gather(&scoped(Some("SBI"), None), "how to apply")
        .await;
    assert_eq!(ev.faq_top_similarity, 0.0);
    assert!(ev.faq_top.is_none());
}
