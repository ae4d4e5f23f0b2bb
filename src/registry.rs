//! Entity registry — the live set of banks, categories, and product names.
//!
//! Values are exactly the distinct values in the product store; nothing is
//! hardcoded. The registry keeps a process-local snapshot refreshed lazily
//! (interval ≥ 60 s or explicit invalidation from ingestion) with a
//! single-flight rebuild so concurrent first-callers do not stampede the
//! store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::catalog::ProductStore;

// ── Snapshot types ────────────────────────────────────────────────────────────

/// One alias of a category, with its provenance.
///
/// Exact aliases (the lowercased canonical spelling and its plural) outrank
/// derived aliases (leading/trailing words of multi-word categories) when
/// matches tie on length, so "loan" resolves to Loan rather than Home Loan.
#[derive(Debug, Clone)]
pub struct CategoryAlias {
    pub alias: String,
    pub exact: bool,
}

/// A category with its alias set.
#[derive(Debug, Clone)]
pub struct CategoryEntry {
    pub canonical: String,
    pub aliases: Vec<CategoryAlias>,
}

/// A bank with its lowercase alias.
#[derive(Debug, Clone)]
pub struct BankEntry {
    pub canonical: String,
    pub alias: String,
}

/// A product name with its owning bank.
#[derive(Debug, Clone)]
pub struct ProductEntry {
    pub canonical: String,
    pub alias: String,
    pub bank: String,
}

/// Immutable view of the entity sets at one rebuild instant.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub banks: Vec<BankEntry>,
    pub categories: Vec<CategoryEntry>,
    pub products: Vec<ProductEntry>,
    built_at: Instant,
}

impl RegistrySnapshot {
    /// Empty snapshot, used before ingestion has populated the store.
    pub fn empty() -> Self {
        Self {
            banks: Vec::new(),
            categories: Vec::new(),
            products: Vec::new(),
            built_at: Instant::now(),
        }
    }

    /// True when no banks are known (ingestion incomplete).
    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    pub fn bank_names(&self) -> Vec<String> {
        self.banks.iter().map(|b| b.canonical.clone()).collect()
    }

    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.canonical.clone()).collect()
    }

    fn age(&self) -> Duration {
        self.built_at.elapsed()
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Lazily refreshed entity cache over a [`ProductStore`].
pub struct EntityRegistry {
    store: Arc<dyn ProductStore>,
    refresh: Duration,
    snapshot: RwLock<Option<Arc<RegistrySnapshot>>>,
    /// Serialises rebuilds; holders re-check the snapshot before building.
    rebuild: Mutex<()>,
}

impl EntityRegistry {
    pub fn new(store: Arc<dyn ProductStore>, refresh: Duration) -> Self {
        Self {
            store,
            refresh,
            snapshot: RwLock::new(None),
            rebuild: Mutex::new(()),
        }
    }

    /// Current snapshot, rebuilding from the store when missing or stale.
    ///
    /// On rebuild failure the previous snapshot (if any) is kept and a
    /// warning is logged; with no previous snapshot an empty one is cached
    /// so the caller can take the ingestion-incomplete path.
    pub async fn snapshot(&self) -> Arc<RegistrySnapshot> {
        if let Some(snap) = self.fresh_snapshot().await {
            return snap;
        }

        // Single-flight: first caller rebuilds, the rest wait then re-check.
        let _guard = self.rebuild.lock().await;
        if let Some(snap) = self.fresh_snapshot().await {
            return snap;
        }

        let rebuilt = match self.build().await {
            Ok(snap) => {
                info!(
                    "Entity registry rebuilt: {} banks, {} categories, {} products",
                    snap.banks.len(),
                    snap.categories.len(),
                    snap.products.len()
                );
                Arc::new(snap)
            }
            Err(e) => {
                let previous = self.snapshot.read().await.clone();
                match previous {
                    Some(stale) => {
                        warn!("Registry rebuild failed ({}); keeping stale snapshot", e);
                        return stale;
                    }
                    None => {
                        warn!("Registry rebuild failed ({}); registry is empty", e);
                        Arc::new(RegistrySnapshot::empty())
                    }
                }
            }
        };

        *self.snapshot.write().await = Some(rebuilt.clone());
        rebuilt
    }

    /// Drop the cached snapshot. Ingestion calls this after writing.
    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
    }

    async fn fresh_snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        let guard = self.snapshot.read().await;
        guard
            .as_ref()
            .filter(|s| s.age() < self.refresh)
            .cloned()
    }

    async fn build(&self) -> Result<RegistrySnapshot, crate::error::RouterError> {
        let banks = self.store.distinct_banks().await?;
        let categories = self.store.distinct_categories().await?;
        let products = self.store.distinct_product_names().await?;

        Ok(RegistrySnapshot {
            banks: banks
                .into_iter()
                .map(|b| BankEntry {
                    alias: b.to_ascii_lowercase(),
                    canonical: b,
                })
                .collect(),
            categories: build_category_entries(&categories),
            products: products
                .into_iter()
                .map(|(name, bank)| ProductEntry {
                    alias: name.to_ascii_lowercase(),
                    canonical: name,
                    bank,
                })
                .collect(),
            built_at: Instant::now(),
        })
    }
}

// ── Alias generation ──────────────────────────────────────────────────────────

/// Build alias sets for each category.
///
/// For every category: the lowercased spelling and its plural are exact
/// aliases. Multi-word categories additionally derive their leading word,
/// trailing word, and the plurals of both ("credit card" → "credit", "card",
/// "cards"). Derived aliases are claimed first-come in sorted category order,
/// so "cards" belongs to Credit Card when Debit Card would also generate it.
pub fn build_category_entries(categories: &[String]) -> Vec<CategoryEntry> {
    let mut claimed: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut entries: Vec<CategoryEntry> = Vec::new();

    // Exact aliases always belong to their own category.
    for cat in categories {
        let lower = cat.to_ascii_lowercase();
        let mut aliases = vec![CategoryAlias {
            alias: lower.clone(),
            exact: true,
        }];
        if !lower.ends_with('s') {
            aliases.push(CategoryAlias {
                alias: format!("{}s", lower),
                exact: true,
            });
        }
        for a in &aliases {
            claimed.insert(a.alias.clone());
        }
        entries.push(CategoryEntry {
            canonical: cat.clone(),
            aliases,
        });
    }

    // Derived aliases, first category wins.
    for (i, cat) in categories.iter().enumerate() {
        let lower = cat.to_ascii_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();
        if words.len() < 2 {
            continue;
        }
        let mut derived: Vec<String> = Vec::new();
        for word in [words[0], words[words.len() - 1]] {
            derived.push(word.to_string());
            if !word.ends_with('s') {
                derived.push(format!("{}s", word));
            }
        }
        for alias in derived {
            if claimed.insert(alias.clone()) {
                entries[i].aliases.push(CategoryAlias {
                    alias,
                    exact: false,
                });
            }
        }
    }

    entries
}
