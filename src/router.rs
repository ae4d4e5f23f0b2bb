//! Smart router facade — the single entry point for routing an utterance.
//!
//! Pre-flight order: greeting short-circuit, follow-up rewrite, scope
//! resolution with context-bank inheritance, signal extraction, parallel
//! evidence retrieval, then the operation validator. Conversation memory is
//! committed only after handlers succeed (never for CLARIFY), via
//! [`SmartRouter::commit`].
//!
//! All collaborators arrive through [`RouterContext`]; there are no
//! process-wide singletons, so tests build a fresh context over in-memory
//! fakes.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    catalog::ProductStore,
    config::{Config, MAX_UTTERANCE_LENGTH},
    evidence::EvidenceRetriever,
    faq::FaqIndex,
    followup::resolve_followup,
    registry::{EntityRegistry, RegistrySnapshot},
    scope, signals,
    state::ConversationState,
    types::{
        ClarifyReason, Evidence, LastTurn, OpKind, Operation, RouterOutcome, RouterRequest,
        RoutingDecision, Scope, Signals,
    },
    validator::{validate, ValidatorInput},
};

/// Everything the router reads or writes, threaded in explicitly.
pub struct RouterContext {
    pub store: Arc<dyn ProductStore>,
    pub faq: Arc<dyn FaqIndex>,
    pub registry: Arc<EntityRegistry>,
    pub state: Arc<ConversationState>,
    pub config: Config,
}

/// The routing facade.
pub struct SmartRouter {
    ctx: RouterContext,
    evidence: EvidenceRetriever,
}

impl SmartRouter {
    pub fn new(ctx: RouterContext) -> Self {
        let evidence = EvidenceRetriever::new(
            ctx.store.clone(),
            ctx.faq.clone(),
            ctx.config.evidence_deadline,
        );
        Self { ctx, evidence }
    }

    pub fn context(&self) -> &RouterContext {
        &self.ctx
    }

    /// Route one utterance. Never returns an error: every failure mode is
    /// folded into a decision (sentinel evidence, CLARIFY, or LLM fallback).
    pub async fn route(&self, request: &RouterRequest) -> RouterOutcome {
        let raw = request.utterance.trim();
        if raw.is_empty() || raw.len() > MAX_UTTERANCE_LENGTH {
            return clarify_outcome(ClarifyReason::Vague);
        }

        let snapshot = self.ctx.registry.snapshot().await;

        // ── Step 1: greeting short-circuit (state untouched) ──
        let normalized = raw
            .trim_end_matches(['!', '?', '.', ','])
            .trim()
            .to_ascii_lowercase();
        if self.ctx.config.greetings.iter().any(|g| *g == normalized) {
            return RouterOutcome::Greeting(greeting_text(&snapshot));
        }

        // ── Step 2: follow-up resolution against session memory ──
        let last = self.ctx.state.last_turn(&request.session_id).await;
        let mut rewritten: Option<String> = None;
        let mut forced: Option<OpKind> = None;
        if let Some(lt) = &last {
            if let Some(rw) = resolve_followup(raw, lt, &snapshot) {
                if let Some(reason) = rw.clarify {
                    return clarify_outcome(reason);
                }
                if let Some(new_utterance) = &rw.utterance {
                    info!("Follow-up rewrite: '{}' => '{}'", raw, new_utterance);
                }
                rewritten = rw.utterance;
                forced = rw.forced;
            }
        }
        let effective: &str = rewritten.as_deref().unwrap_or(raw);

        // ── Steps 3–4: scope and signals ──
        let mut resolved_scope = scope::resolve(effective, &snapshot);
        let extracted = signals::extract(effective);

        // Context-bank inheritance: implicit-list and follow-up paths only.
        // COMPARE/RECOMMEND require explicitly named banks.
        let inheritable =
            rewritten.is_some() || forced.is_some() || !extracted.any();
        if resolved_scope.bank.is_none()
            && inheritable
            && !extracted.compare
            && !extracted.recommend
        {
            if let Some(bank) = last.as_ref().and_then(|lt| lt.bank.clone()) {
                debug!("Inheriting context bank '{}'", bank);
                resolved_scope.bank = Some(bank);
                resolved_scope.bank_inherited = true;
            }
        }

        // ── Step 5: evidence, both probes in parallel ──
        let evidence = self.evidence.gather(&resolved_scope, effective).await;

        // ── Step 6: validation ──
        let validated = validate(&ValidatorInput {
            utterance: effective,
            scope: &resolved_scope,
            signals: &extracted,
            evidence: &evidence,
            snapshot: &snapshot,
            forced,
            faq_threshold: self.ctx.config.faq_similarity_threshold,
        });

        info!(
            "Routing decision for '{}': ops={:?}, signals={}, evidence=(db_count={}, faq={:.2})",
            raw,
            validated
                .operations
                .iter()
                .map(|op| op.kind.tag())
                .collect::<Vec<_>>(),
            summarize_signals(&extracted),
            evidence.db_count,
            evidence.faq_top_similarity,
        );

        RouterOutcome::Decision(RoutingDecision {
            operations: validated.operations,
            clarify: validated.clarify,
            rewritten,
            signals: extracted,
        })
    }

    /// Commit the decision into session memory after handlers succeeded.
    ///
    /// CLARIFY decisions never commit. Product lists and focus products are
    /// recorded separately by the orchestrator's post-execution callbacks.
    pub async fn commit(
        &self,
        session_id: &str,
        utterance: &str,
        decision: &RoutingDecision,
        response_digest: &str,
    ) {
        if decision.is_clarify() {
            return;
        }
        let Some(op) = decision.operations.first() else {
            return;
        };
        self.ctx
            .state
            .commit(
                session_id,
                LastTurn {
                    intent: op.kind,
                    bank: op.scope.bank.clone(),
                    category: op.scope.category.clone(),
                    product_list: Vec::new(),
                    focus_products: Vec::new(),
                    utterance: utterance.to_string(),
                    response_digest: response_digest.to_string(),
                },
            )
            .await;
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn clarify_outcome(reason: ClarifyReason) -> RouterOutcome {
    RouterOutcome::Decision(RoutingDecision {
        operations: vec![Operation {
            kind: OpKind::Clarify,
            scope: Scope::default(),
            clause: None,
            suppress_greeting: false,
            evidence: Evidence::unknown(),
        }],
        clarify: Some(reason),
        rewritten: None,
        signals: Signals::default(),
    })
}

/// Canned greeting naming the live banks.
pub fn greeting_text(snapshot: &RegistrySnapshot) -> String {
    let banks = snapshot.bank_names();
    if banks.is_empty() {
        "Hello! I'm your banking assistant. Ask me about cards, loans, schemes, or procedures."
            .to_string()
    } else {
        format!(
            "Hello! I'm your banking assistant for {}. Ask me about cards, loans, schemes, or procedures.",
            banks.join(", ")
        )
    }
}

fn summarize_signals(signals: &Signals) -> String {
    let mut flags: Vec<&str> = Vec::new();
    if signals.count {
        flags.push("count");
    }
    if signals.list {
        flags.push("list");
    }
    if signals.explain {
        flags.push("explain");
    }
    if signals.explain_all {
        flags.push("explain_all");
    }
    if signals.compare {
        flags.push("compare");
    }
    if signals.recommend {
        flags.push("recommend");
    }
    if !signals.non_product_targets.is_empty() {
        flags.push("non_product_target");
    }
    if flags.is_empty() {
        "none".to_string()
    } else {
        flags.join("+")
    }
}
