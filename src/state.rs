//! Conversation state — per-session `LastTurn` memory.
//!
//! The state exclusively owns each session's memory; the router reads a
//! cloned snapshot at the start of a turn and commits after a successful
//! decision. Sessions are allocated on first use and released either on an
//! explicit reset ("new conversation") or after the idle TTL; the sweep runs
//! opportunistically on every map access so release happens on all paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::types::LastTurn;

struct SessionSlot {
    last: Option<LastTurn>,
    touched: Instant,
}

/// Process-wide conversation memory, keyed by session id.
pub struct ConversationState {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionSlot>>>>,
    ttl: Duration,
}

impl ConversationState {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Snapshot of the session's last turn, if the session is alive.
    pub async fn last_turn(&self, session_id: &str) -> Option<LastTurn> {
        let slot = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()
        }?;
        let guard = slot.lock().await;
        if guard.touched.elapsed() > self.ttl {
            debug!("Session '{}' expired; memory dropped", session_id);
            return None;
        }
        guard.last.clone()
    }

    /// Commit a new turn for the session.
    ///
    /// Persistent entities are sticky: a turn that resolved no bank or
    /// category keeps the previous one, and an empty product list carries
    /// the previous list forward so ordinal follow-ups keep working until a
    /// newer LIST/COUNT replaces it atomically.
    pub async fn commit(&self, session_id: &str, mut turn: LastTurn) {
        let slot = self.ensure_slot(session_id).await;
        let mut guard = slot.lock().await;

        if let Some(prev) = guard.last.take() {
            if turn.bank.is_none() {
                turn.bank = prev.bank;
            }
            if turn.category.is_none() {
                turn.category = prev.category;
            }
            if turn.product_list.is_empty() {
                turn.product_list = prev.product_list;
            }
            if turn.focus_products.is_empty() {
                turn.focus_products = prev.focus_products;
            }
        }

        debug!(
            "Session '{}' committed: intent={}, bank={:?}, category={:?}",
            session_id,
            turn.intent.tag(),
            turn.bank,
            turn.category
        );
        guard.last = Some(turn);
        guard.touched = Instant::now();
    }

    /// Replace the session's remembered product list (post-execution
    /// callback from the LIST/COUNT handlers).
    pub async fn record_product_list(&self, session_id: &str, products: Vec<String>) {
        let slot = self.ensure_slot(session_id).await;
        let mut guard = slot.lock().await;
        if let Some(last) = guard.last.as_mut() {
            last.product_list = products;
            guard.touched = Instant::now();
        }
    }

    /// Replace the session's focus products (post-execution callback from
    /// the EXPLAIN/COMPARE/RECOMMEND handlers).
    pub async fn record_focus_products(&self, session_id: &str, products: Vec<String>) {
        let slot = self.ensure_slot(session_id).await;
        let mut guard = slot.lock().await;
        if let Some(last) = guard.last.as_mut() {
            last.focus_products = products;
            guard.touched = Instant::now();
        }
    }

    /// Drop the session's memory entirely (explicit "new conversation").
    pub async fn reset(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(session_id).is_some() {
            info!("Session '{}' reset", session_id);
        }
    }

    /// Number of live (non-expired) sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn ensure_slot(&self, session_id: &str) -> Arc<Mutex<SessionSlot>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(slot) = sessions.get(session_id) {
                return slot.clone();
            }
        }
        let mut sessions = self.sessions.write().await;
        self.sweep_locked(&mut sessions);
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SessionSlot {
                    last: None,
                    touched: Instant::now(),
                }))
            })
            .clone()
    }

    /// Drop sessions idle past the TTL. Called under the map write lock.
    fn sweep_locked(&self, sessions: &mut HashMap<String, Arc<Mutex<SessionSlot>>>) {
        let ttl = self.ttl;
        sessions.retain(|id, slot| {
            // A locked slot is in use, so it is certainly not expired.
            match slot.try_lock() {
                Ok(guard) => {
                    let keep = guard.touched.elapsed() <= ttl;
                    if !keep {
                        debug!("Session '{}' swept after idle TTL", id);
                    }
                    keep
                }
                Err(_) => true,
            }
        });
    }
}
