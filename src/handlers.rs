//! Operation handlers — what runs after the router has decided.
//!
//! COUNT and LIST are pure catalog reads formatted in Rust so the numbers
//! and names can never drift. EXPLAIN, COMPARE, RECOMMEND, FAQ, and the
//! fallback synthesize text through the LLM client, grounded in catalog or
//! FAQ context assembled here.

use std::sync::Arc;

use tracing::warn;

use crate::{
    catalog::ProductStore,
    config::Config,
    error::RouterError,
    llm::LlmClient,
    types::{OpKind, Operation, Product},
};

const SYSTEM_PROMPT: &str = "You are a precise banking assistant. Answer only from the \
provided context. If the context does not cover the question, say so briefly \
instead of inventing details.";

/// What one handler produced.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutput {
    pub text: String,
    /// Ordered product names, set by COUNT and LIST for conversation memory.
    pub product_names: Vec<String>,
    /// Products the response focused on, set by EXPLAIN/COMPARE/RECOMMEND.
    pub focus_products: Vec<String>,
}

/// Executes routed operations against the catalog and the LLM.
pub struct Handlers {
    store: Arc<dyn ProductStore>,
    llm: LlmClient,
    config: Config,
}

impl Handlers {
    pub fn new(store: Arc<dyn ProductStore>, config: Config) -> Self {
        Self {
            store,
            llm: LlmClient::new(),
            config,
        }
    }

    /// Run one operation. `utterance` is the full user input; operations
    /// carrying their own clause (multi-op, rewrites) use that instead.
    pub async fn execute(
        &self,
        op: &Operation,
        utterance: &str,
    ) -> Result<HandlerOutput, RouterError> {
        let target = op.clause.as_deref().unwrap_or(utterance);
        match op.kind {
            OpKind::Count => self.count(op).await,
            OpKind::List => self.list(op).await,
            OpKind::Explain => self.explain(op, target).await,
            OpKind::ExplainAll => self.explain_all(op, target).await,
            OpKind::Compare => self.compare(op, target).await,
            OpKind::Recommend => self.recommend(op, target).await,
            OpKind::Faq => self.faq(op, target).await,
            OpKind::LlmFallback => self.fallback(target).await,
            // CLARIFY is answered by the orchestrator from the prompt text.
            OpKind::Clarify => Ok(HandlerOutput::default()),
        }
    }

    // ── Deterministic handlers ───────────────────────────────────────────────

    async fn count(&self, op: &Operation) -> Result<HandlerOutput, RouterError> {
        let bank = op.scope.bank.as_deref();
        let category = op.scope.category.as_deref();
        let n = self.store.count(bank, category, None).await?;

        let label = match (bank, category) {
            (Some(b), Some(c)) => format!("{} {}", b, c),
            (Some(b), None) => b.to_string(),
            (None, Some(c)) => c.to_string(),
            (None, None) => "matching".to_string(),
        };
        let text = format!("There are {} {} products.", n, label);

        // Remember the names so ordinal follow-ups work after a COUNT.
        let product_names = match (bank, category) {
            (Some(b), Some(c)) => self
                .store
                .list(b, c)
                .await?
                .into_iter()
                .map(|p| p.name)
                .collect(),
            _ => Vec::new(),
        };

        Ok(HandlerOutput {
            text,
            product_names,
            focus_products: Vec::new(),
        })
    }

    async fn list(&self, op: &Operation) -> Result<HandlerOutput, RouterError> {
        let (Some(bank), Some(category)) = (op.scope.bank.as_deref(), op.scope.category.as_deref())
        else {
            return Ok(HandlerOutput {
                text: "I need both a bank and a product type to list products.".to_string(),
                ..HandlerOutput::default()
            });
        };

        let products = self.store.list(bank, category).await?;
        if products.is_empty() {
            return Ok(HandlerOutput {
                text: format!("I found no {} products for {}.", category, bank),
                ..HandlerOutput::default()
            });
        }

        let mut lines = vec![format!(
            "{} {} products ({} total):",
            bank,
            category,
            products.len()
        )];
        for (i, p) in products.iter().enumerate() {
            match &p.summary {
                Some(s) => lines.push(format!("{}. {} - {}", i + 1, p.name, s)),
                None => lines.push(format!("{}. {}", i + 1, p.name)),
            }
        }

        Ok(HandlerOutput {
            text: lines.join("\n"),
            product_names: products.into_iter().map(|p| p.name).collect(),
            focus_products: Vec::new(),
        })
    }

    // ── LLM-backed handlers ──────────────────────────────────────────────────

    async fn explain(&self, op: &Operation, target: &str) -> Result<HandlerOutput, RouterError> {
        let product = match (&op.scope.bank, &op.scope.product_name) {
            (Some(bank), Some(name)) => self.store.get(bank, name).await?,
            _ => None,
        };

        match product {
            Some(p) => {
                let context = product_context(std::slice::from_ref(&p));
                let prompt = format!("Context:\n{}\n\nQuestion: {}", context, target);
                let text = self.llm.generate(&self.config, SYSTEM_PROMPT, &prompt).await?;
                Ok(HandlerOutput {
                    text,
                    product_names: Vec::new(),
                    focus_products: vec![p.name],
                })
            }
            None => self.fallback(target).await,
        }
    }

    async fn explain_all(&self, op: &Operation, target: &str) -> Result<HandlerOutput, RouterError> {
        let products = self.gather_products(op).await?;
        if products.is_empty() {
            return self.fallback(target).await;
        }

        let context = product_context(&products);
        let prompt = format!(
            "Context:\n{}\n\nDescribe each of these products in turn, covering every one. \
             Question: {}",
            context, target
        );
        let text = self.llm.generate(&self.config, SYSTEM_PROMPT, &prompt).await?;
        Ok(HandlerOutput {
            text,
            product_names: Vec::new(),
            focus_products: products.into_iter().map(|p| p.name).collect(),
        })
    }

    async fn compare(&self, op: &Operation, target: &str) -> Result<HandlerOutput, RouterError> {
        let products = self.gather_products(op).await?;
        if products.is_empty() {
            return self.fallback(target).await;
        }

        let context = product_context(&products);
        let prompt = format!(
            "Context:\n{}\n\nCompare these products side by side on their key attributes. \
             Question: {}",
            context, target
        );
        let text = self.llm.generate(&self.config, SYSTEM_PROMPT, &prompt).await?;
        Ok(HandlerOutput {
            text,
            product_names: Vec::new(),
            focus_products: products.into_iter().map(|p| p.name).collect(),
        })
    }

    async fn recommend(&self, op: &Operation, target: &str) -> Result<HandlerOutput, RouterError> {
        let products = self.gather_products(op).await?;
        if products.is_empty() {
            return self.fallback(target).await;
        }

        let context = product_context(&products);
        let prompt = format!(
            "Context:\n{}\n\nRecommend the most suitable product, starting your answer \
             with its exact name. Question: {}",
            context, target
        );
        let text = self.llm.generate(&self.config, SYSTEM_PROMPT, &prompt).await?;

        // The best-matching candidate name that appears in the reply becomes
        // the remembered recommendation; fall back to all candidates.
        let mentioned: Vec<String> = products
            .iter()
            .filter(|p| text.contains(&p.name))
            .map(|p| p.name.clone())
            .collect();
        let focus = if mentioned.is_empty() {
            products.into_iter().map(|p| p.name).collect()
        } else {
            mentioned
        };

        Ok(HandlerOutput {
            text,
            product_names: Vec::new(),
            focus_products: focus,
        })
    }

    async fn faq(&self, op: &Operation, target: &str) -> Result<HandlerOutput, RouterError> {
        let mut prompt = String::new();
        if let Some(hit) = &op.evidence.faq_top {
            prompt.push_str(&format!(
                "FAQ context:\nQ: {}\nA: {}\n\n",
                hit.entry.question, hit.entry.answer
            ));
        }
        prompt.push_str(&format!("Question: {}", target));
        if op.suppress_greeting {
            prompt.push_str("\n\nAnswer directly, without any greeting or preamble.");
        }

        let text = self.llm.generate(&self.config, SYSTEM_PROMPT, &prompt).await?;
        Ok(HandlerOutput {
            text,
            ..HandlerOutput::default()
        })
    }

    async fn fallback(&self, target: &str) -> Result<HandlerOutput, RouterError> {
        let text = self.llm.generate(&self.config, SYSTEM_PROMPT, target).await?;
        Ok(HandlerOutput {
            text,
            ..HandlerOutput::default()
        })
    }

    // ── Context assembly ─────────────────────────────────────────────────────

    /// Products in the operation's scope: every named bank crossed with the
    /// category; all banks when none is named.
    async fn gather_products(&self, op: &Operation) -> Result<Vec<Product>, RouterError> {
        let Some(category) = op.scope.category.as_deref() else {
            return Ok(Vec::new());
        };

        let banks = if op.scope.banks().is_empty() {
            self.store.distinct_banks().await?
        } else {
            op.scope.banks()
        };

        let mut products: Vec<Product> = Vec::new();
        for bank in &banks {
            match self.store.list(bank, category).await {
                Ok(mut list) => products.append(&mut list),
                Err(e) => warn!("Listing {} {} failed: {}", bank, category, e),
            }
        }
        Ok(products)
    }
}

/// Compact text rendering of products for LLM context.
fn product_context(products: &[Product]) -> String {
    products
        .iter()
        .map(|p| {
            let mut line = format!("- {} ({} {})", p.name, p.bank, p.category);
            if let Some(summary) = &p.summary {
                line.push_str(&format!(": {}", summary));
            }
            if !p.attributes.is_empty() {
                let attrs: Vec<String> = p
                    .attributes
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                line.push_str(&format!(" [{}]", attrs.join(", ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
