//! Follow-up resolution — rewriting context-dependent utterances.
//!
//! A pure function over `(utterance, LastTurn, registry snapshot)`: it holds
//! no reference back to the router, which breaks the resolver/router cycle.
//! When a rule matches, the utterance is rewritten into a self-contained
//! "virtual query" (optionally with a forced intent) so downstream stages
//! never see a pronoun or an ordinal.

use crate::{
    registry::RegistrySnapshot,
    types::{ClarifyReason, LastTurn, OpKind},
};

/// Outcome of a follow-up rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    /// The self-contained replacement utterance, when one was produced.
    pub utterance: Option<String>,
    /// Intent the rewrite already decided, bypassing the validator table.
    pub forced: Option<OpKind>,
    /// Set when the follow-up itself must clarify (bad ordinal, no memory).
    pub clarify: Option<ClarifyReason>,
}

impl Rewrite {
    fn virtual_query(utterance: String, forced: OpKind) -> Self {
        Self {
            utterance: Some(utterance),
            forced: Some(forced),
            clarify: None,
        }
    }

    fn rewritten(utterance: String) -> Self {
        Self {
            utterance: Some(utterance),
            forced: None,
            clarify: None,
        }
    }

    fn clarify(reason: ClarifyReason) -> Self {
        Self {
            utterance: None,
            forced: None,
            clarify: Some(reason),
        }
    }
}

/// Apply the rewrite rules in order; `None` means pass through unchanged.
///
/// The resolver does not attempt coreference on arbitrary pronouns — only
/// the anchored cases below. Everything else falls through to the evidence
/// router.
pub fn resolve_followup(
    utterance: &str,
    last: &LastTurn,
    snapshot: &RegistrySnapshot,
) -> Option<Rewrite> {
    let lower = utterance.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return None;
    }

    // ── Rule 1: ordinal reference into the last list ──
    if let Some(ordinal) = parse_ordinal_reference(&lower) {
        if last.product_list.is_empty() {
            return Some(Rewrite::clarify(ClarifyReason::NoPriorList));
        }
        let len = last.product_list.len();
        let index = match ordinal {
            OrdinalRef::Index(n) => {
                if n == 0 || n > len {
                    return Some(Rewrite::clarify(ClarifyReason::OrdinalOutOfRange { len }));
                }
                n - 1
            }
            OrdinalRef::Last => len - 1,
        };
        let name = last.product_list[index].clone();
        return Some(Rewrite::virtual_query(
            format!("explain {}", name),
            OpKind::Explain,
        ));
    }

    // ── Rule 2: "list them" after a COUNT ──
    if is_list_them(&lower) {
        if last.intent == OpKind::Count {
            if let (Some(bank), Some(category)) = (&last.bank, &last.category) {
                return Some(Rewrite::virtual_query(
                    format!("list {} {}", bank, category),
                    OpKind::List,
                ));
            }
        }
        return None;
    }

    // ── Rule 3: bare "why" / "how" / "what about …" after a product turn ──
    if matches!(
        last.intent,
        OpKind::Explain | OpKind::ExplainAll | OpKind::Compare | OpKind::Recommend
    ) && !last.focus_products.is_empty()
    {
        // "which is better" after a COMPARE asks for a recommendation over
        // the compared products.
        if last.intent == OpKind::Compare && is_which_is_better(&lower) {
            let joined = last.focus_products.join(" vs ");
            return Some(Rewrite::virtual_query(
                format!("which is better: {}", joined),
                OpKind::Recommend,
            ));
        }

        if is_anchored_question(&lower) {
            let joined = last.focus_products.join(" vs ");
            return Some(Rewrite::rewritten(format!("{}: {}", joined, utterance.trim())));
        }
    }

    // ── Rule 4: bank-only utterance with a remembered category ──
    if let Some(category) = &last.category {
        if let Some(bank) = snapshot
            .banks
            .iter()
            .find(|b| b.alias == lower)
            .map(|b| b.canonical.clone())
        {
            return Some(Rewrite::virtual_query(
                format!("list {} {}", bank, category),
                OpKind::List,
            ));
        }
    }

    None
}

// ── Ordinal parsing ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrdinalRef {
    /// 1-based index.
    Index(usize),
    Last,
}

const ORDINAL_WORDS: &[(&str, usize)] = &[
    ("first", 1),
    ("second", 2),
    ("third", 3),
    ("fourth", 4),
    ("fifth", 5),
    ("sixth", 6),
    ("seventh", 7),
    ("eighth", 8),
    ("ninth", 9),
    ("tenth", 10),
];

/// Words that may surround an ordinal without changing its meaning.
const FILLER_WORDS: &[&str] = &[
    "explain", "show", "describe", "tell", "give", "details", "detail", "about", "me", "of",
    "the", "one", "that", "item", "option", "please", "number", "#", "card", "product",
];

/// Parse an utterance that is *primarily* an ordinal reference.
///
/// "explain the second one" and "the 3rd" qualify; "what is the 1st year
/// fee" does not, because it carries substance beyond the reference.
fn parse_ordinal_reference(lower: &str) -> Option<OrdinalRef> {
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '#')
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() || words.len() > 6 {
        return None;
    }

    let mut found: Option<OrdinalRef> = None;
    for word in &words {
        let parsed = parse_ordinal_word(word);
        match (parsed, found) {
            (Some(_), Some(_)) => return None, // two ordinals: not a reference
            (Some(o), None) => found = Some(o),
            (None, _) => {}
        }
    }
    let found = found?;

    // Every remaining word must be filler, otherwise the utterance has its
    // own subject and the ordinal is incidental ("1st year fee").
    let all_filler = words
        .iter()
        .all(|w| parse_ordinal_word(w).is_some() || FILLER_WORDS.contains(w));
    if !all_filler {
        return None;
    }

    // A bare digit needs an explain-like anchor to count as a reference.
    if let OrdinalRef::Index(_) = found {
        let bare_digit = words
            .iter()
            .any(|w| w.chars().all(|c| c.is_ascii_digit()) && parse_ordinal_word(w).is_some());
        let anchored = words
            .iter()
            .any(|w| matches!(*w, "explain" | "show" | "describe" | "details" | "tell" | "number"))
            || words.iter().any(|w| w.starts_with('#'));
        if bare_digit && !anchored && words.len() > 1 {
            return None;
        }
    }

    Some(found)
}

fn parse_ordinal_word(word: &str) -> Option<OrdinalRef> {
    if word == "last" {
        return Some(OrdinalRef::Last);
    }
    if let Some((_, n)) = ORDINAL_WORDS.iter().find(|(w, _)| w == &word) {
        return Some(OrdinalRef::Index(*n));
    }
    // Suffixed forms: 1st, 2nd, 3rd, 4th …
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(digits) = word.strip_suffix(suffix) {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return digits.parse::<usize>().ok().map(OrdinalRef::Index);
            }
        }
    }
    // #N
    if let Some(digits) = word.strip_prefix('#') {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return digits.parse::<usize>().ok().map(OrdinalRef::Index);
        }
    }
    // Bare digits (anchor requirement checked by the caller).
    if word.chars().all(|c| c.is_ascii_digit()) {
        return word.parse::<usize>().ok().map(OrdinalRef::Index);
    }
    None
}

// ── Rule predicates ───────────────────────────────────────────────────────────

/// "list them", "show those", "what are they" and close variants.
fn is_list_them(lower: &str) -> bool {
    let words: Vec<&str> = lower.split_whitespace().collect();
    if words.is_empty() || words.len() > 4 {
        return false;
    }
    let leads = matches!(words[0], "list" | "show" | "display")
        || (words.len() >= 2 && words[0] == "what" && words[1] == "are");
    let referent = words
        .iter()
        .any(|w| matches!(*w, "them" | "those" | "these" | "they" | "all" | "names"));
    leads && (referent || words.len() == 1 && words[0] == "list")
}

/// A short question with no subject of its own.
fn is_anchored_question(lower: &str) -> bool {
    let word_count = lower.split_whitespace().count();
    if lower == "why" || lower == "how" {
        return true;
    }
    if lower.starts_with("what about ") {
        return true;
    }
    if (lower.starts_with("why ") || lower.starts_with("how "))
        && word_count <= 4
        && !lower.contains("many")
        && !lower.contains("much")
    {
        return true;
    }
    false
}

/// "which is better", "which one", "which should i choose" after a COMPARE.
fn is_which_is_better(lower: &str) -> bool {
    let word_count = lower.split_whitespace().count();
    word_count <= 6
        && lower.contains("which")
        && (lower.contains("better")
            || lower.contains("best")
            || lower.contains("choose")
            || lower.contains("pick")
            || lower.contains("one"))
}
