//! Product catalog — the relational store consumed by the router.
//!
//! The router only ever reads. The [`ProductStore`] trait is the seam for
//! pluggable backends; [`InMemoryCatalog`] is the in-process implementation
//! used by the binary and by tests, seedable from a JSON file.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{error::RouterError, types::Product};

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Read-only product catalog interface.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Exact count of products under the given filters. `None` filters match
    /// everything. All filters are case-insensitive.
    async fn count(
        &self,
        bank: Option<&str>,
        category: Option<&str>,
        product_name: Option<&str>,
    ) -> Result<u64, RouterError>;

    /// Ordered products for a (bank, category) pair.
    async fn list(&self, bank: &str, category: &str) -> Result<Vec<Product>, RouterError>;

    /// A single product by bank and name, or `None`.
    async fn get(&self, bank: &str, name: &str) -> Result<Option<Product>, RouterError>;

    /// Distinct bank names, sorted.
    async fn distinct_banks(&self) -> Result<Vec<String>, RouterError>;

    /// Distinct category names, sorted.
    async fn distinct_categories(&self) -> Result<Vec<String>, RouterError>;

    /// Distinct `(product_name, owning_bank)` pairs, sorted by name.
    /// The owning bank rides along so the entity registry can resolve a
    /// product mention back to its bank.
    async fn distinct_product_names(&self) -> Result<Vec<(String, String)>, RouterError>;
}

// ── In-memory implementation ──────────────────────────────────────────────────

/// In-memory `ProductStore` for the binary and tests.
pub struct InMemoryCatalog {
    inner: RwLock<Vec<Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }

    /// Build a catalog pre-seeded with `products`.
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            inner: RwLock::new(products),
        }
    }

    /// Load a catalog from a JSON file containing an array of products.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RouterError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let products: Vec<Product> = serde_json::from_str(&raw)?;
        tracing::info!(
            "Catalog seeded with {} products from '{}'",
            products.len(),
            path.as_ref().display()
        );
        Ok(Self::with_products(products))
    }

    /// Insert or replace a product, keyed by (bank, name).
    pub async fn upsert(&self, product: Product) {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.iter_mut().find(|p| {
            p.bank.eq_ignore_ascii_case(&product.bank)
                && p.name.eq_ignore_ascii_case(&product.name)
        }) {
            *existing = product;
        } else {
            inner.push(product);
        }
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(filter: Option<&str>, value: &str) -> bool {
    filter.map_or(true, |f| f.eq_ignore_ascii_case(value))
}

#[async_trait]
impl ProductStore for InMemoryCatalog {
    async fn count(
        &self,
        bank: Option<&str>,
        category: Option<&str>,
        product_name: Option<&str>,
    ) -> Result<u64, RouterError> {
        let inner = self.inner.read().await;
        let n = inner
            .iter()
            .filter(|p| {
                matches(bank, &p.bank)
                    && matches(category, &p.category)
                    && matches(product_name, &p.name)
            })
            .count();
        Ok(n as u64)
    }

    async fn list(&self, bank: &str, category: &str) -> Result<Vec<Product>, RouterError> {
        let inner = self.inner.read().await;
        let mut products: Vec<Product> = inner
            .iter()
            .filter(|p| {
                p.bank.eq_ignore_ascii_case(bank) && p.category.eq_ignore_ascii_case(category)
            })
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get(&self, bank: &str, name: &str) -> Result<Option<Product>, RouterError> {
        let inner = self.inner.read().await;
        Ok(inner
            .iter()
            .find(|p| {
                p.bank.eq_ignore_ascii_case(bank) && p.name.eq_ignore_ascii_case(name)
            })
            .cloned())
    }

    async fn distinct_banks(&self) -> Result<Vec<String>, RouterError> {
        let inner = self.inner.read().await;
        let set: BTreeSet<String> = inner.iter().map(|p| p.bank.clone()).collect();
        Ok(set.into_iter().collect())
    }

    async fn distinct_categories(&self) -> Result<Vec<String>, RouterError> {
        let inner = self.inner.read().await;
        let set: BTreeSet<String> = inner.iter().map(|p| p.category.clone()).collect();
        Ok(set.into_iter().collect())
    }

    async fn distinct_product_names(&self) -> Result<Vec<(String, String)>, RouterError> {
        let inner = self.inner.read().await;
        let set: BTreeSet<(String, String)> = inner
            .iter()
            .map(|p| (p.name.clone(), p.bank.clone()))
            .collect();
        Ok(set.into_iter().collect())
    }
}
