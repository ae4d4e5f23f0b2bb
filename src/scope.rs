//! Scope resolution — the (bank, category, product) triple of an utterance.
//!
//! Matching runs against the live entity registry snapshot, never against
//! hardcoded lists. Whole-word boundaries apply everywhere except product
//! names, whose aliases carry their internal punctuation verbatim. Unknown
//! tokens are ignored silently; resolution never fails.

use crate::registry::RegistrySnapshot;
use crate::signals::find_phrase;
use crate::types::Scope;

/// Resolve the scope of `utterance` against `snapshot`.
///
/// Banks are collected in textual order — the first becomes `bank`, the rest
/// `alt_banks` (consumed by COMPARE). The best category alias wins by length,
/// then exactness, then sorted canonical order. A product name matched
/// without any bank inherits its owning bank from the registry.
pub fn resolve(utterance: &str, snapshot: &RegistrySnapshot) -> Scope {
    let lower = utterance.to_ascii_lowercase();

    // ── Banks, in textual order ──
    let mut bank_hits: Vec<(usize, String)> = snapshot
        .banks
        .iter()
        .filter_map(|b| find_phrase(&lower, &b.alias).map(|pos| (pos, b.canonical.clone())))
        .collect();
    bank_hits.sort_by_key(|(pos, _)| *pos);
    bank_hits.dedup_by(|a, b| a.1 == b.1);

    let mut banks = bank_hits.into_iter().map(|(_, name)| name);
    let bank = banks.next();
    let alt_banks: Vec<String> = banks.collect();

    // ── Category: longest alias, exact beats derived, then sorted order ──
    let mut category: Option<(usize, bool, String)> = None;
    for entry in &snapshot.categories {
        for alias in &entry.aliases {
            if find_phrase(&lower, &alias.alias).is_none() {
                continue;
            }
            let candidate = (alias.alias.len(), alias.exact, entry.canonical.clone());
            let better = match &category {
                None => true,
                Some((len, exact, canonical)) => {
                    candidate.0 > *len
                        || (candidate.0 == *len && candidate.1 && !exact)
                        || (candidate.0 == *len && candidate.1 == *exact && candidate.2 < *canonical)
                }
            };
            if better {
                category = Some(candidate);
            }
        }
    }
    let category = category.map(|(_, _, canonical)| canonical);

    // ── Product name: longest match wins (more specific than a category) ──
    let mut product: Option<(usize, String, String)> = None;
    for entry in &snapshot.products {
        if find_phrase(&lower, &entry.alias).is_none() {
            continue;
        }
        let better = product
            .as_ref()
            .map_or(true, |(len, _, _)| entry.alias.len() > *len);
        if better {
            product = Some((entry.alias.len(), entry.canonical.clone(), entry.bank.clone()));
        }
    }

    let (product_name, owner_bank) = match product {
        Some((_, name, owner)) => (Some(name), Some(owner)),
        None => (None, None),
    };

    // A product mention without an explicit bank pins the owning bank.
    let bank = bank.or(owner_bank);

    Scope {
        bank,
        alt_banks,
        category,
        product_name,
        bank_inherited: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::build_category_entries;
    use crate::registry::{BankEntry, ProductEntry, RegistrySnapshot};

    fn snapshot() -> RegistrySnapshot {
        let mut snap = RegistrySnapshot::empty();
        snap.banks = ["SBI", "HDFC"]
            .iter()
            .map(|b| BankEntry {
                canonical: b.to_string(),
                alias: b.to_ascii_lowercase(),
            })
            .collect();
        snap.categories = build_category_entries(&[
            "Credit Card".to_string(),
            "Debit Card".to_string(),
            "Home Loan".to_string(),
            "Loan".to_string(),
        ]);
        snap.products = vec![
            ProductEntry {
                canonical: "SBI SimplyCLICK".to_string(),
                alias: "sbi simplyclick".to_string(),
                bank: "SBI".to_string(),
            },
            ProductEntry {
                canonical: "Regalia Gold".to_string(),
                alias: "regalia gold".to_string(),
                bank: "HDFC".to_string(),
            },
        ];
        snap
    }

    #[test]
    fn bank_and_category_resolve() {
        let scope = resolve("how many SBI credit cards", &snapshot());
        assert_eq!(scope.bank.as_deref(), Some("SBI"));
        assert_eq!(scope.category.as_deref(), Some("Credit Card"));
        assert_eq!(scope.strength(), 1.0);
    }

    #[test]
    fn bare_bank_is_half_strength() {
        let scope = resolve("sbi", &snapshot());
        assert_eq!(scope.bank.as_deref(), Some("SBI"));
        assert_eq!(scope.category, None);
        assert_eq!(scope.strength(), 0.5);
    }

    #[test]
    fn multiple_banks_keep_textual_order() {
        let scope = resolve("compare SBI vs HDFC home loan", &snapshot());
        assert_eq!(scope.bank.as_deref(), Some("SBI"));
        assert_eq!(scope.alt_banks, vec!["HDFC".to_string()]);
        assert_eq!(scope.category.as_deref(), Some("Home Loan"));
    }

    #[test]
    fn loan_resolves_to_exact_category_not_home_loan() {
        let scope = resolve("apply for a loan", &snapshot());
        assert_eq!(scope.category.as_deref(), Some("Loan"));
    }

    #[test]
    fn cards_resolves_to_first_card_category() {
        let scope = resolve("SBI cards", &snapshot());
        assert_eq!(scope.category.as_deref(), Some("Credit Card"));
    }

    #[test]
    fn product_without_bank_inherits_owner() {
        let scope = resolve("tell me about regalia gold", &snapshot());
        assert_eq!(scope.product_name.as_deref(), Some("Regalia Gold"));
        assert_eq!(scope.bank.as_deref(), Some("HDFC"));
    }

    #[test]
    fn unknown_tokens_resolve_to_empty_scope() {
        let scope = resolve("tell me a story about elves", &snapshot());
        assert_eq!(scope.strength(), 0.0);
        assert!(scope.bank.is_none() && scope.category.is_none());
    }
}
