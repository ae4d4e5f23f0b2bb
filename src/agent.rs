//! Agent orchestration — one conversation turn end to end.
//!
//! Routes the utterance, executes the decided operations in order under the
//! request deadline, merges multi-operation results, and commits session
//! memory. On deadline expiry the user gets a CLARIFY-shaped apology and
//! nothing is committed.

use tokio::time::timeout;
use tracing::{error, warn};

use crate::{
    error::RouterError,
    handlers::{HandlerOutput, Handlers},
    router::{RouterContext, SmartRouter},
    types::{ClarifyReason, RouterOutcome, RouterRequest, RouterResponse, RoutingDecision},
};

/// Separator between the parts of a multi-operation reply.
const MULTI_OP_SEPARATOR: &str = "\n\n---\n\n";

/// Characters of the reply kept as the committed response digest.
const DIGEST_LEN: usize = 120;

/// A finished turn: the user-facing text plus the wire response.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    pub response: RouterResponse,
}

/// Drives router, handlers, and conversation state for each request.
pub struct Agent {
    router: SmartRouter,
    handlers: Handlers,
}

impl Agent {
    pub fn new(ctx: RouterContext) -> Self {
        let handlers = Handlers::new(ctx.store.clone(), ctx.config.clone());
        let router = SmartRouter::new(ctx);
        Self { router, handlers }
    }

    pub fn router(&self) -> &SmartRouter {
        &self.router
    }

    /// Process one utterance for one session.
    pub async fn process(&self, request: &RouterRequest) -> AgentReply {
        // Explicit reset releases the session memory immediately.
        let normalized = request.utterance.trim().to_ascii_lowercase();
        if normalized == "new conversation" || normalized == "/new" {
            self.router
                .context()
                .state
                .reset(&request.session_id)
                .await;
            let text = "Starting fresh. What would you like to know?".to_string();
            let outcome = RouterOutcome::Greeting(text.clone());
            return AgentReply {
                text,
                response: RouterResponse::from_outcome(&outcome),
            };
        }

        let outcome = self.router.route(request).await;
        let response = RouterResponse::from_outcome(&outcome);

        let decision = match outcome {
            RouterOutcome::Greeting(text) => {
                return AgentReply { text, response };
            }
            RouterOutcome::Decision(decision) => decision,
        };

        if let Some(reason) = &decision.clarify {
            return AgentReply {
                text: reason.prompt(),
                response,
            };
        }

        let deadline = self.router.context().config.request_deadline;
        let executed = timeout(deadline, self.execute(&decision, request)).await;

        let text = match executed {
            Ok(Ok(merged)) => {
                let digest: String = merged.text.chars().take(DIGEST_LEN).collect();
                self.router
                    .commit(&request.session_id, &request.utterance, &decision, &digest)
                    .await;

                let state = &self.router.context().state;
                if !merged.product_names.is_empty() {
                    state
                        .record_product_list(&request.session_id, merged.product_names)
                        .await;
                }
                if !merged.focus_products.is_empty() {
                    state
                        .record_focus_products(&request.session_id, merged.focus_products)
                        .await;
                }
                merged.text
            }
            Ok(Err(e)) => {
                error!("Handler execution failed: {}", e);
                "Sorry, I ran into a problem answering that. Please try again.".to_string()
            }
            Err(_) => {
                warn!("Request deadline expired before handlers finished");
                ClarifyReason::Timeout.prompt()
            }
        };

        AgentReply { text, response }
    }

    /// Execute the decision's operations in order and merge their outputs.
    ///
    /// A failing operation is skipped with a warning so its sibling can
    /// still answer; if every operation fails the whole turn errors and no
    /// commit happens.
    async fn execute(
        &self,
        decision: &RoutingDecision,
        request: &RouterRequest,
    ) -> Result<HandlerOutput, RouterError> {
        let mut parts: Vec<String> = Vec::new();
        let mut merged = HandlerOutput::default();

        for op in &decision.operations {
            match self.handlers.execute(op, &request.utterance).await {
                Ok(out) => {
                    if !out.text.is_empty() {
                        parts.push(out.text);
                    }
                    merged.product_names.extend(out.product_names);
                    merged.focus_products.extend(out.focus_products);
                }
                Err(e) => warn!("{} handler failed: {}", op.kind.tag(), e),
            }
        }

        if parts.is_empty() {
            return Err(RouterError::Llm(
                "every operation handler failed".to_string(),
            ));
        }

        merged.text = parts.join(MULTI_OP_SEPARATOR);
        Ok(merged)
    }
}
