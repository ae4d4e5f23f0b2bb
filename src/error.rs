//! Custom error types for the banking assistant.

use thiserror::Error;

/// Unified error type propagated through router construction and handlers.
///
/// Routing itself never surfaces an error to the caller — backend failures
/// are reduced to sentinel evidence and the decision proceeds. These variants
/// cover everything outside that recovery path: configuration, seeding,
/// LLM synthesis, and I/O.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("FAQ index error: {0}")]
    FaqIndex(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Input validation error: {0}")]
    InputValidation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
