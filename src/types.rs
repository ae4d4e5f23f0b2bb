//! Shared types and data structures for the banking assistant.

use serde::{Deserialize, Serialize};

// ── Operations ────────────────────────────────────────────────────────────────

/// Tag of a routed operation.
///
/// COMPARE and RECOMMEND may shadow COUNT; FAQ may co-occur with COUNT or
/// LIST in a multi-operation decision. Exactly one CLARIFY terminates a
/// decision on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpKind {
    Count,
    List,
    Explain,
    ExplainAll,
    Compare,
    Recommend,
    Faq,
    Clarify,
    LlmFallback,
}

impl OpKind {
    /// Display tag, matching the wire encoding.
    pub fn tag(&self) -> &'static str {
        match self {
            OpKind::Count => "COUNT",
            OpKind::List => "LIST",
            OpKind::Explain => "EXPLAIN",
            OpKind::ExplainAll => "EXPLAIN_ALL",
            OpKind::Compare => "COMPARE",
            OpKind::Recommend => "RECOMMEND",
            OpKind::Faq => "FAQ",
            OpKind::Clarify => "CLARIFY",
            OpKind::LlmFallback => "LLM_FALLBACK",
        }
    }
}

/// A single operation in a routing decision.
///
/// The evidence snapshot is carried for logging and tests but does not
/// appear in the wire encoding (the response `debug` block covers it).
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    #[serde(rename = "tag")]
    pub kind: OpKind,
    pub scope: Scope,
    /// Clause or rewritten text this operation should run against, when it
    /// differs from the full utterance (multi-op clauses, follow-up rewrites).
    #[serde(rename = "rewritten_utterance", skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,
    /// Hint for the second operation of a multi-op decision so handlers do
    /// not repeat boilerplate.
    #[serde(skip)]
    pub suppress_greeting: bool,
    #[serde(skip)]
    pub evidence: Evidence,
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// The (bank, category, product) triple resolved from an utterance against
/// the live entity registry. Derived per utterance; never mutated downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scope {
    pub bank: Option<String>,
    /// Additional banks mentioned after the first, in textual order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alt_banks: Vec<String>,
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// True when `bank` was inherited from conversation state rather than
    /// resolved from the utterance itself.
    #[serde(skip)]
    pub bank_inherited: bool,
}

impl Scope {
    /// `0.0` iff nothing resolved; `0.5` iff exactly one of {bank, category};
    /// `1.0` iff both. A resolved product name does not change the value.
    pub fn strength(&self) -> f32 {
        match (self.bank.is_some(), self.category.is_some()) {
            (true, true) => 1.0,
            (false, false) => 0.0,
            _ => 0.5,
        }
    }

    /// All banks in textual order (primary first).
    pub fn banks(&self) -> Vec<String> {
        let mut banks: Vec<String> = Vec::new();
        if let Some(b) = &self.bank {
            banks.push(b.clone());
        }
        banks.extend(self.alt_banks.iter().cloned());
        banks
    }
}

// ── Signals ───────────────────────────────────────────────────────────────────

/// Position of a conjunction token inside the utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Conjunction {
    /// Byte offset of the token in the lowercased utterance.
    pub offset: usize,
    pub token: &'static str,
}

/// Lexical cues extracted from the utterance. A signal suggests an intent
/// but is never decisive on its own — the validator weighs it against
/// evidence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Signals {
    pub count: bool,
    pub list: bool,
    pub explain: bool,
    pub explain_all: bool,
    pub compare: bool,
    pub recommend: bool,
    /// Non-product nouns present in the utterance (step, document, process…).
    /// Non-empty means the utterance is about *how*, not *what*.
    pub non_product_targets: Vec<String>,
    pub conjunctions: Vec<Conjunction>,
}

impl Signals {
    pub fn has_conjunction(&self) -> bool {
        !self.conjunctions.is_empty()
    }

    /// True when any structured-operation cue fired.
    pub fn any(&self) -> bool {
        self.count
            || self.list
            || self.explain
            || self.explain_all
            || self.compare
            || self.recommend
    }
}

// ── Evidence ──────────────────────────────────────────────────────────────────

/// Measurable facts about the utterance's target, drawn from the product
/// store and FAQ index, used to validate or refute signal-based guesses.
#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    /// Product count under the resolved scope; `-1` when unknown (scope
    /// under-specified, backend timeout, or retry exhausted).
    pub db_count: i64,
    /// Best FAQ similarity in [0, 1]; higher means more relevant.
    pub faq_top_similarity: f32,
    /// Metadata of the best FAQ match, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faq_top: Option<FaqHit>,
}

impl Evidence {
    /// Sentinel evidence: both sources unknown.
    pub fn unknown() -> Self {
        Self {
            db_count: crate::config::DB_COUNT_UNKNOWN,
            faq_top_similarity: 0.0,
            faq_top: None,
        }
    }
}

// ── Clarification ─────────────────────────────────────────────────────────────

/// Why the router is asking the user back instead of committing an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClarifyReason {
    /// Scope resolved a category but no bank. Carries up to five known banks.
    MissingBank { known: Vec<String> },
    /// Scope resolved a bank but no category. Carries the known categories.
    MissingCategory { known: Vec<String> },
    /// Neither dimension resolved and no signals fired.
    Vague,
    /// An ordinal follow-up pointed past the end of the remembered list.
    OrdinalOutOfRange { len: usize },
    /// An ordinal follow-up arrived with no remembered list.
    NoPriorList,
    /// Two or more banks mentioned without a compare signal.
    AmbiguousBanks { banks: Vec<String> },
    /// The entity registry is empty — ingestion has not run yet.
    IngestionIncomplete,
    /// The request deadline expired before handlers finished.
    Timeout,
}

impl ClarifyReason {
    /// User-facing prompt text for this reason.
    pub fn prompt(&self) -> String {
        match self {
            ClarifyReason::MissingBank { known } => {
                if known.is_empty() {
                    "Which bank?".to_string()
                } else {
                    format!("Which bank? Known banks: {}.", known.join(", "))
                }
            }
            ClarifyReason::MissingCategory { known } => {
                if known.is_empty() {
                    "Which product type?".to_string()
                } else {
                    let cats: Vec<String> =
                        known.iter().map(|c| c.to_lowercase()).collect();
                    format!("Which product type? ({})", cats.join(", "))
                }
            }
            ClarifyReason::Vague => {
                "Could you be more specific — a bank, a product category, or a specific question?"
                    .to_string()
            }
            ClarifyReason::OrdinalOutOfRange { len } => {
                format!("I only have {} items in the last list.", len)
            }
            ClarifyReason::NoPriorList => {
                "I don't have a previous list to pick from. Ask for a list first.".to_string()
            }
            ClarifyReason::AmbiguousBanks { banks } => format!(
                "Did you mean {}? Name one bank, or ask me to compare them.",
                banks.join(" or ")
            ),
            ClarifyReason::IngestionIncomplete => {
                "My product catalog is still being loaded. Please try again shortly.".to_string()
            }
            ClarifyReason::Timeout => {
                "Sorry, that took longer than expected. Could you try again with a narrower question?"
                    .to_string()
            }
        }
    }
}

// ── Routing decision ──────────────────────────────────────────────────────────

/// Ordered operations (size 1–2) plus clarification state for one utterance.
/// If CLARIFY is present, it is the only operation.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub operations: Vec<Operation>,
    pub clarify: Option<ClarifyReason>,
    /// Rewritten utterance produced by the follow-up resolver, if any.
    pub rewritten: Option<String>,
    pub signals: Signals,
}

impl RoutingDecision {
    pub fn is_clarify(&self) -> bool {
        self.clarify.is_some()
    }

    /// Evidence snapshot of the primary operation.
    pub fn evidence(&self) -> Evidence {
        self.operations
            .first()
            .map(|op| op.evidence.clone())
            .unwrap_or_else(Evidence::unknown)
    }
}

/// What the router produced for one utterance: either a canned greeting
/// (state untouched) or a full routing decision.
#[derive(Debug, Clone)]
pub enum RouterOutcome {
    Greeting(String),
    Decision(RoutingDecision),
}

// ── Wire types ────────────────────────────────────────────────────────────────

/// One incoming utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterRequest {
    pub session_id: String,
    pub utterance: String,
    /// ISO 8601 arrival time, caller-supplied.
    pub timestamp: String,
}

/// Debug block attached to every response: the full signal/evidence/rewrite
/// triple the decision was made from.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDebug {
    pub signals: Signals,
    pub evidence: Evidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten: Option<String>,
}

/// Router output for one utterance.
#[derive(Debug, Clone, Serialize)]
pub struct RouterResponse {
    pub operations: Vec<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarify_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    pub debug: RoutingDebug,
}

impl RouterResponse {
    /// Build the wire response from a router outcome.
    pub fn from_outcome(outcome: &RouterOutcome) -> Self {
        match outcome {
            RouterOutcome::Greeting(text) => Self {
                operations: Vec::new(),
                clarify_prompt: None,
                greeting: Some(text.clone()),
                debug: RoutingDebug {
                    signals: Signals::default(),
                    evidence: Evidence::unknown(),
                    rewritten: None,
                },
            },
            RouterOutcome::Decision(decision) => Self {
                operations: decision.operations.clone(),
                clarify_prompt: decision.clarify.as_ref().map(|r| r.prompt()),
                greeting: None,
                debug: RoutingDebug {
                    signals: decision.signals.clone(),
                    evidence: decision.evidence(),
                    rewritten: decision.rewritten.clone(),
                },
            },
        }
    }
}

// ── Catalog and FAQ records ───────────────────────────────────────────────────

/// One product in the relational catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub bank: String,
    pub category: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// One question/answer pair in the FAQ index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub bank: String,
    pub category: String,
    pub question: String,
    pub answer: String,
}

/// A scored FAQ retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct FaqHit {
    /// Similarity in [0, 1]; higher is more relevant.
    pub similarity: f32,
    pub entry: FaqEntry,
}

// ── Conversation memory ───────────────────────────────────────────────────────

/// The minimal per-session memory that makes context-dependent utterances
/// self-contained. Depth is one successful turn.
#[derive(Debug, Clone)]
pub struct LastTurn {
    pub intent: OpKind,
    pub bank: Option<String>,
    pub category: Option<String>,
    /// Ordered product names produced by the last successful LIST or COUNT.
    pub product_list: Vec<String>,
    /// Products the last EXPLAIN/COMPARE/RECOMMEND focused on.
    pub focus_products: Vec<String>,
    pub utterance: String,
    pub response_digest: String,
}
