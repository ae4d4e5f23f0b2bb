//! Signal extraction — lexical cues suggesting an intent.
//!
//! A fixed, ordered rule table maps substrings and word classes to boolean
//! flags. Signals are hints only; the operation validator weighs them
//! against catalog and FAQ evidence before anything is committed.

use crate::types::{Conjunction, Signals};

// ── Cue tables ────────────────────────────────────────────────────────────────

const COUNT_CUES: &[&str] = &["how many", "how much", "count", "number of", "total"];

const LIST_CUES: &[&str] = &[
    "list",
    "show",
    "display",
    "what are",
    "give me all",
    "names of",
];

const EXPLAIN_CUES: &[&str] = &[
    "explain",
    "tell me about",
    "details of",
    "what is",
    "describe",
    "features of",
    "information on",
];

const EXPLAIN_ALL_CUES: &[&str] = &[
    "explain all",
    "describe all",
    "each of the",
    "details of all",
    "tell me about all",
];

const COMPARE_CUES: &[&str] = &[
    "compare",
    "vs",
    "versus",
    "difference between",
    "compared to",
    "comparison",
];

const RECOMMEND_CUES: &[&str] = &[
    "best",
    "recommend",
    "suggest",
    "which is better",
    "suitable for",
    "good for",
    "better for",
    "which should i",
];

/// Nouns and verbs that turn an apparent quantity question into a procedural
/// one. "how many steps" must not become COUNT.
pub const NON_PRODUCT_TARGETS: &[&str] = &[
    "step",
    "steps",
    "document",
    "documents",
    "process",
    "procedure",
    "way",
    "apply",
    "application",
    "applying",
    "close",
    "block",
    "withdraw",
    "withdrawal",
    "open",
    "eligibility",
    "eligible",
    "requirement",
    "requirements",
    "duration",
    "minute",
    "minutes",
    "time",
    "times",
];

/// Clause separators, matched verbatim (spaces included where shown).
const CONJUNCTIONS: &[&str] = &[" and ", ";", " + ", " also ", " plus "];

// ── Matching helpers ──────────────────────────────────────────────────────────

/// First whole-word occurrence of `phrase` in `haystack`, by byte offset.
///
/// Both ends of the match must sit on a word boundary (start/end of string
/// or a non-alphanumeric byte). Multi-word phrases work because their inner
/// spaces are part of the needle.
pub(crate) fn find_phrase(haystack: &str, phrase: &str) -> Option<usize> {
    if phrase.is_empty() {
        return None;
    }
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(rel) = haystack[from..].find(phrase) {
        let at = from + rel;
        let end = at + phrase.len();
        let before_ok = at == 0 || !bytes[at - 1].is_ascii_alphanumeric();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

fn any_cue(lower: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| find_phrase(lower, cue).is_some())
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Extract all signal flags from `utterance`.
///
/// Suppression order follows intent priority: explain_all suppresses plain
/// explain, and list is only reported when no count/compare/recommend cue
/// fired ("compare all" is a compare, not a list).
pub fn extract(utterance: &str) -> Signals {
    let lower = utterance.to_ascii_lowercase();

    let count = any_cue(&lower, COUNT_CUES);
    let explain_all = any_cue(&lower, EXPLAIN_ALL_CUES);
    let explain = !explain_all && any_cue(&lower, EXPLAIN_CUES);
    let compare = any_cue(&lower, COMPARE_CUES);
    let recommend = any_cue(&lower, RECOMMEND_CUES);
    let list = any_cue(&lower, LIST_CUES) && !count && !compare && !recommend;

    let non_product_targets: Vec<String> = NON_PRODUCT_TARGETS
        .iter()
        .filter(|t| find_phrase(&lower, t).is_some())
        .map(|t| t.to_string())
        .collect();

    let mut conjunctions: Vec<Conjunction> = Vec::new();
    for token in CONJUNCTIONS {
        let mut from = 0;
        while let Some(rel) = lower[from..].find(token) {
            let offset = from + rel;
            conjunctions.push(Conjunction { offset, token });
            from = offset + token.len();
        }
    }
    conjunctions.sort_by_key(|c| c.offset);

    Signals {
        count,
        list,
        explain,
        explain_all,
        compare,
        recommend,
        non_product_targets,
        conjunctions,
    }
}
