//! Configuration loading from environment variables via dotenvy.
//! No routing threshold is ever hardcoded outside this module.

use std::time::Duration;

use crate::error::RouterError;

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Anthropic API key — sourced from `ANTHROPIC_API_KEY`
    pub anthropic_api_key: String,
    /// Base URL for the Anthropic API — sourced from `ANTHROPIC_BASE_URL`
    pub anthropic_base_url: String,
    /// Model identifier for synthesis stages — sourced from `LLM_MODEL`
    pub llm_model: String,
    /// Path to the product catalog seed file — sourced from `CATALOG_PATH`
    pub catalog_path: String,
    /// Path to the FAQ index seed file — sourced from `FAQ_INDEX_PATH`
    pub faq_index_path: String,
    /// Minimum FAQ similarity for an FAQ routing decision —
    /// sourced from `FAQ_SIMILARITY_THRESHOLD`. Higher values mean greater
    /// relevance; the in-memory index guarantees the [0, 1] scale.
    pub faq_similarity_threshold: f32,
    /// Per-call deadline for each evidence backend —
    /// sourced from `EVIDENCE_DEADLINE_MS`
    pub evidence_deadline: Duration,
    /// Whole-request deadline covering downstream handler time —
    /// sourced from `REQUEST_DEADLINE_MS`
    pub request_deadline: Duration,
    /// Minimum age before the entity registry is rebuilt —
    /// sourced from `REGISTRY_REFRESH_SECS`
    pub registry_refresh: Duration,
    /// Idle lifetime of a conversation session —
    /// sourced from `SESSION_TTL_SECS`
    pub session_ttl: Duration,
    /// Closed set of greeting utterances — sourced from `GREETING_SET`
    /// (comma-separated), lowercased on load.
    pub greetings: Vec<String>,
}

/// Load configuration purely from already-set environment variables.
///
/// Does **not** call `dotenvy::dotenv()` — useful in tests that need to
/// control the env precisely via [`std::env::set_var`] / [`std::env::remove_var`].
///
/// # Errors
/// Returns [`RouterError::Config`] if required variables are missing or invalid.
pub fn load_config_from_env() -> Result<Config, RouterError> {
    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .map_err(|_| RouterError::Config("ANTHROPIC_API_KEY not set".to_string()))?;

    if api_key.is_empty() {
        return Err(RouterError::Config(
            "ANTHROPIC_API_KEY is empty".to_string(),
        ));
    }

    let base_url = std::env::var("ANTHROPIC_BASE_URL")
        .unwrap_or_else(|_| "https://api.anthropic.com".to_string());

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(RouterError::Config(
            "ANTHROPIC_BASE_URL must start with http:// or https://".to_string(),
        ));
    }

    let llm_model =
        std::env::var("LLM_MODEL").unwrap_or_else(|_| "claude-sonnet-4-5".to_string());

    let catalog_path =
        std::env::var("CATALOG_PATH").unwrap_or_else(|_| "./data/products.json".to_string());

    let faq_index_path =
        std::env::var("FAQ_INDEX_PATH").unwrap_or_else(|_| "./data/faqs.json".to_string());

    let faq_similarity_threshold = std::env::var("FAQ_SIMILARITY_THRESHOLD")
        .ok()
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|v| (0.0..=1.0).contains(v))
        .unwrap_or(DEFAULT_FAQ_SIMILARITY_THRESHOLD);

    let evidence_deadline = Duration::from_millis(
        std::env::var("EVIDENCE_DEADLINE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_EVIDENCE_DEADLINE_MS),
    );

    let request_deadline = Duration::from_millis(
        std::env::var("REQUEST_DEADLINE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_DEADLINE_MS),
    );

    let registry_refresh = Duration::from_secs(
        std::env::var("REGISTRY_REFRESH_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REGISTRY_REFRESH_SECS),
    );

    let session_ttl = Duration::from_secs(
        std::env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SESSION_TTL_SECS),
    );

    let greetings: Vec<String> = std::env::var("GREETING_SET")
        .unwrap_or_else(|_| DEFAULT_GREETINGS.join(","))
        .split(',')
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect();

    Ok(Config {
        anthropic_api_key: api_key,
        anthropic_base_url: base_url,
        llm_model,
        catalog_path,
        faq_index_path,
        faq_similarity_threshold,
        evidence_deadline,
        request_deadline,
        registry_refresh,
        session_ttl,
        greetings,
    })
}

/// Load configuration from the environment (`.env` + system env vars).
///
/// Loads `.env` via `dotenvy` first (ignoring errors if the file is absent),
/// then delegates to [`load_config_from_env`].
pub fn load_config() -> Result<Config, RouterError> {
    // Load .env if present; ignore the error — variables may already be set externally.
    let _ = dotenvy::dotenv();
    load_config_from_env()
}

// ── Router thresholds and defaults ─────────────────────────────────────────

/// FAQ similarity at or above which an utterance routes to FAQ.
pub const DEFAULT_FAQ_SIMILARITY_THRESHOLD: f32 = 0.60;

/// FAQ similarity at or above which the smart fork refuses to promote a bare
/// category utterance to LIST (the utterance is likely procedural).
pub const SMART_FORK_FAQ_GUARD: f32 = 0.75;

/// Per-backend evidence deadline in milliseconds.
pub const DEFAULT_EVIDENCE_DEADLINE_MS: u64 = 100;

/// Backoff before the single evidence retry, in milliseconds.
pub const EVIDENCE_RETRY_BACKOFF_MS: u64 = 50;

/// Whole-request deadline in milliseconds, covering handler time.
pub const DEFAULT_REQUEST_DEADLINE_MS: u64 = 2_000;

/// Minimum age of the entity-registry snapshot before a rebuild.
pub const DEFAULT_REGISTRY_REFRESH_SECS: u64 = 60;

/// Idle session lifetime before conversation memory is released.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1_800;

/// Sentinel for an unknown catalog count.
pub const DB_COUNT_UNKNOWN: i64 = -1;

/// Number of registry banks named in a missing-bank clarification.
pub const CLARIFY_BANK_SAMPLE: usize = 5;

/// Maximum allowed length (characters) for an utterance.
pub const MAX_UTTERANCE_LENGTH: usize = 2_048;

/// Default greeting set; overridable via `GREETING_SET`.
pub const DEFAULT_GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
];
