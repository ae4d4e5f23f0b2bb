//! Tests for [`bank_assistant::agent`] — full turns over deterministic
//! handlers (COUNT/LIST/CLARIFY/greeting).
//!
//! The LLM endpoint points at an unroutable local port, so LLM-backed
//! operations fail fast; deterministic operations must still answer and
//! multi-op decisions must degrade to their deterministic half.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bank_assistant::agent::Agent;
use bank_assistant::catalog::{InMemoryCatalog, ProductStore};
use bank_assistant::config::Config;
use bank_assistant::error::RouterError;
use bank_assistant::faq::FaqIndex;
use bank_assistant::registry::EntityRegistry;
use bank_assistant::router::RouterContext;
use bank_assistant::state::ConversationState;
use bank_assistant::types::{FaqEntry, FaqHit, OpKind, Product, RouterRequest};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn product(bank: &str, category: &str, name: &str) -> Product {
    Product {
        bank: bank.to_string(),
        category: category.to_string(),
        name: name.to_string(),
        summary: None,
        attributes: serde_json::Map::new(),
    }
}

fn seeded_catalog() -> Arc<InMemoryCatalog> {
    let products: Vec<Product> = (1..=16)
        .map(|i| product("SBI", "Credit Card", &format!("SBI Card {:02}", i)))
        .collect();
    Arc::new(InMemoryCatalog::with_products(products))
}

struct ScriptedFaq {
    similarity: f32,
}

#[async_trait]
impl FaqIndex for ScriptedFaq {
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
                question: "How do I apply?".to_string(),
                answer: "Apply online.".to_string(),
            },
        }])
    }
}

fn test_config(request_deadline: Duration) -> Config {
    Config {
        anthropic_api_key: "test-key".to_string(),
        // Unroutable: LLM-backed handlers fail fast instead of hanging.
        anthropic_base_url: "http://127.0.0.1:1".to_string(),
        llm_model: "test-model".to_string(),
        catalog_path: String::new(),
        faq_index_path: String::new(),
        faq_similarity_threshold: 0.60,
        evidence_deadline: Duration::from_millis(100),
        request_deadline,
        registry_refresh: Duration::from_secs(60),
        session_ttl: Duration::from_secs(1_800),
        greetings: vec!["hi".to_string(), "hello".to_string()],
    }
}

fn agent_over(store: Arc<dyn ProductStore>, faq_similarity: f32) -> Agent {
    let registry = Arc::new(EntityRegistry::new(store.clone(), Duration::from_secs(60)));
    Agent::new(RouterContext {
        store,
        faq: Arc::new(ScriptedFaq {
            similarity: faq_similarity,
        }),
        registry,
        state: Arc::new(ConversationState::new(Duration::from_secs(1_800))),
        config: test_config(Duration::from_secs(2)),
    })
}

fn request(session: &str, utterance: &str) -> RouterRequest {
    RouterRequest {
        session_id: session.to_string(),
        utterance: utterance.to_string(),
        timestamp: "2026-08-02T12:00:00Z".to_string(),
    }
}

// ── Turns ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn greeting_gets_canned_text() {
    let agent = agent_over(seeded_catalog(), 0.10);
    let reply = agent.process(&request("g", "hello")).await;
    assert!(reply.text.contains("banking assistant"));
    assert!(reply.response.greeting.is_some());
    assert!(reply.response.operations.is_empty());
}

#[tokio::test]
async fn count_turn_answers_and_commits() {
    let agent = agent_over(seeded_catalog(), 0.15);
    let reply = agent.process(&request("c", "how many SBI credit cards")).await;

    assert!(reply.text.contains("16"), "text was: {}", reply.text);

    let state = &agent.router().context().state;
    let last = state.last_turn("c").await.expect("committed");
    assert_eq!(last.intent, OpKind::Count);
    // COUNT remembers the names so ordinal follow-ups work.
    assert_eq!(last.product_list.len(), 16);
}

#[tokio::test]
async fn list_turn_enumerates_every_product() {
    let agent = agent_over(seeded_catalog(), 0.10);
    let reply = agent.process(&request("l", "list SBI credit cards")).await;

    assert!(reply.text.contains("16 total"), "text was: {}", reply.text);
    assert!(reply.text.contains("SBI Card 01"));
    assert!(reply.text.contains("SBI Card 16"));

    let last = agent
        .router()
        .context()
        .state
        .last_turn("l")
        .await
        .expect("committed");
    assert_eq!(last.intent, OpKind::List);
    assert_eq!(last.product_list.len(), 16);
    assert_eq!(last.product_list[1], "SBI Card 02");
}

#[tokio::test]
async fn clarify_turn_answers_with_prompt_and_skips_commit() {
    let agent = agent_over(seeded_catalog(), 0.10);
    let reply = agent.process(&request("q", "list cards")).await;

    assert!(reply.text.starts_with("Which bank?"), "text: {}", reply.text);
    assert!(agent
        .router()
        .context()
        .state
        .last_turn("q")
        .await
        .is_none());
}

#[tokio::test]
async fn count_then_list_them_uses_memory() {
    let agent = agent_over(seeded_catalog(), 0.15);
    let _ = agent.process(&request("m", "how many SBI credit cards")).await;
    let reply = agent.process(&request("m", "list them")).await;

    assert!(reply.text.contains("16 total"), "text was: {}", reply.text);
    assert_eq!(
        reply.response.operations.first().map(|op| op.kind),
        Some(OpKind::List)
    );
}

#[tokio::test]
async fn multi_op_degrades_to_deterministic_half_when_llm_is_down() {
    let agent = agent_over(seeded_catalog(), 0.76);
    let reply = agent
        .process(&request("m2", "how many SBI cards and how to apply"))
        .await;

    // Routing still decided both operations.
    let kinds: Vec<OpKind> = reply
        .response
        .operations
        .iter()
        .map(|op| op.kind)
        .collect();
    assert_eq!(kinds, vec![OpKind::Count, OpKind::Faq]);

    // The FAQ half needs the LLM (down), so only the count text survives.
    assert!(reply.text.contains("16"), "text was: {}", reply.text);
}

#[tokio::test]
async fn new_conversation_resets_memory() {
    let agent = agent_over(seeded_catalog(), 0.15);
    let _ = agent.process(&request("r", "how many SBI credit cards")).await;
    assert!(agent
        .router()
        .context()
        .state
        .last_turn("r")
        .await
        .is_some());

    let reply = agent.process(&request("r", "new conversation")).await;
    assert!(reply.text.contains("Starting fresh"));
    assert!(agent
        .router()
        .context()
        .state
        .last_turn("r")
        .await
        .is_none());
}

// ── Request deadline ──────────────────────────────────────────────────────────

/// Catalog whose list() is slower than the request deadline.
struct SlowListStore {
    inner: InMemoryCatalog,
    delay: Duration,
}

#[async_trait]
impl ProductStore for SlowListStore {
    async fn count(
        &self,
        bank: Option<&str>,
        category: Option<&str>,
        product_name: Option<&str>,
    ) -> Result<u64, RouterError> {
        self.inner.count(bank, category, product_name).await
    }

    async fn list(&self, bank: &str, category: &str) -> Result<Vec<Product>, RouterError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list(bank, category).await
    }

    async fn get(&self, bank: &str, name: &str) -> Result<Option<Product>, RouterError> {
        self.inner.get(bank, name).await
    }

    async fn distinct_banks(&self) -> Result<Vec<String>, RouterError> {
        self.inner.distinct_banks().await
    }

    async fn distinct_categories(&self) -> Result<Vec<String>, RouterError> {
        self.inner.distinct_categories().await
    }

    async fn distinct_product_names(&self) -> Result<Vec<(String, String)>, RouterError> {
        self.inner.distinct_product_names().await
    }
}

#[tokio::test]
async fn deadline_expiry_apologises_without_committing() {
    let products: Vec<Product> = (1..=4)
        .map(|i| product("SBI", "Credit Card", &format!("SBI Card {:02}", i)))
        .collect();
    let store = Arc::new(SlowListStore {
        inner: InMemoryCatalog::with_products(products),
        delay: Duration::from_millis(200),
    });
    let registry = Arc::new(EntityRegistry::new(
        store.clone() as Arc<dyn ProductStore>,
        Duration::from_secs(60),
    ));
    let agent = Agent::new(RouterContext {
        store,
        faq: Arc::new(ScriptedFaq { similarity: 0.10 }),
        registry,
        state: Arc::new(ConversationState::new(Duration::from_secs(1_800))),
        config: test_config(Duration::from_millis(50)),
    });

    let reply = agent.process(&request("t", "list SBI credit cards")).await;
    assert!(
        reply.text.contains("longer than expected"),
        "text was: {}",
        reply.text
    );
    assert!(agent
        .router()
        .context()
        .state
        .last_turn("t")
        .await
        .is_none());
}
