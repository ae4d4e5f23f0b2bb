//! Operation validation — evidence-based intent decisions.
//!
//! Signals, scope, and evidence combine into an ordered operation list
//! through a fixed decision procedure evaluated top to bottom with early
//! return. Evidence outranks keywords: a count signal without a non-zero
//! catalog count never becomes COUNT, and a non-product target refuses
//! COUNT even when the catalog would have counted something.

use tracing::{debug, info, warn};

use crate::{
    config::SMART_FORK_FAQ_GUARD,
    registry::RegistrySnapshot,
    signals::find_phrase,
    types::{ClarifyReason, Evidence, OpKind, Operation, Scope, Signals},
};

/// Validator output: the ordered operations plus the clarification reason
/// when the single operation is CLARIFY.
#[derive(Debug, Clone)]
pub struct Validated {
    pub operations: Vec<Operation>,
    pub clarify: Option<ClarifyReason>,
}

impl Validated {
    fn single(kind: OpKind, scope: &Scope, evidence: &Evidence, clause: Option<String>) -> Self {
        Self {
            operations: vec![Operation {
                kind,
                scope: scope.clone(),
                clause,
                suppress_greeting: false,
                evidence: evidence.clone(),
            }],
            clarify: None,
        }
    }

    fn clarify(reason: ClarifyReason, scope: &Scope, evidence: &Evidence) -> Self {
        Self {
            operations: vec![Operation {
                kind: OpKind::Clarify,
                scope: scope.clone(),
                clause: None,
                suppress_greeting: false,
                evidence: evidence.clone(),
            }],
            clarify: Some(reason),
        }
    }

    /// The only multi-operation shape: COUNT over the resolved scope, then
    /// FAQ over the residual clause with its greeting suppressed.
    fn count_then_faq(
        count_clause: String,
        faq_clause: String,
        scope: &Scope,
        evidence: &Evidence,
    ) -> Self {
        Self {
            operations: vec![
                Operation {
                    kind: OpKind::Count,
                    scope: scope.clone(),
                    clause: Some(count_clause),
                    suppress_greeting: false,
                    evidence: evidence.clone(),
                },
                Operation {
                    kind: OpKind::Faq,
                    scope: scope.clone(),
                    clause: Some(faq_clause),
                    suppress_greeting: true,
                    evidence: evidence.clone(),
                },
            ],
            clarify: None,
        }
    }
}

/// Everything the decision procedure reads for one utterance.
pub struct ValidatorInput<'a> {
    pub utterance: &'a str,
    pub scope: &'a Scope,
    pub signals: &'a Signals,
    pub evidence: &'a Evidence,
    pub snapshot: &'a RegistrySnapshot,
    /// Intent forced by the follow-up resolver; bypasses the rule table.
    pub forced: Option<OpKind>,
    pub faq_threshold: f32,
}

/// Run the decision procedure.
pub fn validate(input: &ValidatorInput<'_>) -> Validated {
    let ValidatorInput {
        utterance,
        scope,
        signals,
        evidence,
        snapshot,
        forced,
        faq_threshold,
    } = input;

    // A follow-up rewrite already decided the intent; keep the evidence
    // snapshot for logging but skip the rule table.
    if let Some(kind) = forced {
        debug!("Forced intent from follow-up: {}", kind.tag());
        return Validated::single(*kind, scope, evidence, None);
    }

    // Entity-dependent rules are meaningless with no known banks.
    if snapshot.is_empty() {
        warn!("Entity registry empty; clarifying (ingestion incomplete)");
        return Validated::clarify(ClarifyReason::IngestionIncomplete, scope, evidence);
    }

    let strength = scope.strength();

    // ── Rule 1: non-product target override ──
    // "how many steps to apply" has a count word but asks *how*, not *what*.
    if !signals.non_product_targets.is_empty() {
        if signals.count
            && signals.has_conjunction()
            && evidence.db_count >= 1
            && strength >= 0.5
        {
            if let Some((count_clause, faq_clause)) = split_clauses(utterance, signals) {
                info!(
                    "Multi-operation: COUNT + FAQ ('{}' / '{}')",
                    count_clause, faq_clause
                );
                return Validated::count_then_faq(count_clause, faq_clause, scope, evidence);
            }
        }
        info!(
            "Non-product target {:?}; routing to FAQ",
            signals.non_product_targets
        );
        return Validated::single(OpKind::Faq, scope, evidence, None);
    }

    // ── Rule 2: compare/recommend shadow count ──
    // "which SBI card is best" does not want a number. Requires a category
    // plus at least one explicitly named bank; with no bank the utterance
    // falls through to the later rules.
    let banks = scope.banks();
    if (signals.compare || signals.recommend) && scope.category.is_some() && !banks.is_empty() {
        if signals.compare {
            if banks.len() == 1 {
                // A comparison within a single bank is an exhaustive walk of
                // that bank's category.
                info!("Single-bank compare; walking the category as EXPLAIN_ALL");
                return Validated::single(OpKind::ExplainAll, scope, evidence, None);
            }
            if evidence.db_count != 0 {
                return Validated::single(OpKind::Compare, scope, evidence, None);
            }
        } else if evidence.db_count != 0 {
            return Validated::single(OpKind::Recommend, scope, evidence, None);
        }
    }

    // Two banks without a compare signal is ambiguous, not a comparison.
    if banks.len() >= 2 && !signals.compare {
        return Validated::clarify(ClarifyReason::AmbiguousBanks { banks }, scope, evidence);
    }

    // ── Rule 3: explicit COUNT, catalog-validated ──
    // db_count >= 1 is necessary: "how many elves does SBI offer" counts zero
    // and must not become COUNT.
    if signals.count && evidence.db_count >= 1 && strength >= 0.5 {
        return Validated::single(OpKind::Count, scope, evidence, None);
    }

    // ── Rule 4: explicit LIST ──
    // Listing needs both dimensions: the store's list() takes (bank, category).
    if signals.list {
        if scope.bank.is_some() && scope.category.is_some() {
            if evidence.db_count >= 1 {
                return Validated::single(OpKind::List, scope, evidence, None);
            }
        } else if scope.bank.is_none() && scope.category.is_none() {
            return Validated::clarify(ClarifyReason::Vague, scope, evidence);
        } else {
            return Validated::clarify(missing_dimension(scope, snapshot), scope, evidence);
        }
    }

    // ── Rule 5: implicit LIST (smart fork) ──
    // A bare category promotes to LIST when a bank is in play (possibly
    // inherited from conversation context), unless the FAQ score says the
    // utterance is procedural.
    if !signals.any() && scope.category.is_some() {
        if scope.bank.is_some() {
            if evidence.db_count >= 1 && evidence.faq_top_similarity < SMART_FORK_FAQ_GUARD {
                info!(
                    "Smart fork: '{}' promoted to LIST under {:?}",
                    utterance, scope.bank
                );
                return Validated::single(OpKind::List, scope, evidence, None);
            }
        } else if evidence.faq_top_similarity < *faq_threshold {
            return Validated::clarify(missing_dimension(scope, snapshot), scope, evidence);
        }
    }

    // ── Rule 6: EXPLAIN / EXPLAIN_ALL ──
    if signals.explain_all && scope.category.is_some() {
        return Validated::single(OpKind::ExplainAll, scope, evidence, None);
    }
    if signals.explain && scope.product_name.is_some() {
        return Validated::single(OpKind::Explain, scope, evidence, None);
    }

    // ── Rule 7: FAQ by evidence ──
    if evidence.faq_top_similarity >= *faq_threshold {
        return Validated::single(OpKind::Faq, scope, evidence, None);
    }

    // ── Rule 8: bare bank or bare category ──
    if strength == 0.5 && !signals.any() {
        return Validated::clarify(missing_dimension(scope, snapshot), scope, evidence);
    }

    // ── Rule 9: nothing matched — hand over to the LLM ──
    Validated::single(OpKind::LlmFallback, scope, evidence, None)
}

/// Clarification reason naming whichever scope dimension is absent.
fn missing_dimension(scope: &Scope, snapshot: &RegistrySnapshot) -> ClarifyReason {
    if scope.bank.is_none() {
        let mut known = snapshot.bank_names();
        known.truncate(crate::config::CLARIFY_BANK_SAMPLE);
        ClarifyReason::MissingBank { known }
    } else {
        ClarifyReason::MissingCategory {
            known: snapshot.category_names(),
        }
    }
}

/// Split a multi-operation utterance at its first usable conjunction.
///
/// Returns `(count_clause, faq_clause)` where the count clause carries the
/// count cue and the FAQ clause carries a non-product target. The count
/// clause must itself be free of non-product targets, otherwise the whole
/// utterance is procedural and no split happens.
fn split_clauses(utterance: &str, signals: &Signals) -> Option<(String, String)> {
    let lower = utterance.to_ascii_lowercase();

    for conj in &signals.conjunctions {
        if conj.offset == 0 || conj.offset + conj.token.len() >= utterance.len() {
            continue;
        }
        let left = utterance[..conj.offset].trim();
        let right = utterance[conj.offset + conj.token.len()..].trim();
        if left.is_empty() || right.is_empty() {
            continue;
        }

        let left_lower = &lower[..conj.offset];
        let right_lower = &lower[conj.offset + conj.token.len()..];

        let count_cue =
            |s: &str| find_phrase(s, "how many").is_some() || find_phrase(s, "how much").is_some()
                || find_phrase(s, "count").is_some()
                || find_phrase(s, "number of").is_some()
                || find_phrase(s, "total").is_some();
        let target = |s: &str| {
            crate::signals::NON_PRODUCT_TARGETS
                .iter()
                .any(|t| find_phrase(s, t).is_some())
        };

        if count_cue(left_lower) && !target(left_lower) && target(right_lower) {
            return Some((left.to_string(), right.to_string()));
        }
        if count_cue(right_lower) && !target(right_lower) && target(left_lower) {
            // Order in the decision is still COUNT before FAQ.
            return Some((right.to_string(), left.to_string()));
        }
    }
    None
}
