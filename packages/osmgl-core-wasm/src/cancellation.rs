use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

/// Shared flag checked by producers between entities.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    pub id: String,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

}

#[derive(Default)]
pub struct CancellationManager {
    tokens: HashMap<String, CancellationToken>,
}

impl CancellationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh token. A previous token with the same id is
    /// cancelled first so a stale producer stops. An empty id gets a
    /// generated one.
    pub fn create_token(&mut self, id: &str) -> CancellationToken {
        let id = if id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            id.to_string()
        };
        let token = CancellationToken::new(id.clone());
        if let Some(previous) = self.tokens.insert(id, token.clone()) {
            previous.cancel();
        }
        token
    }

    pub fn cancel_token(&mut self, id: &str) -> bool {
        match self.tokens.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn get_token(&self, id: &str) -> Option<&CancellationToken> {
        self.tokens.get(id)
    }

    pub fn cleanup_token(&mut self, id: &str) {
        self.tokens.remove(id);
    }
}

lazy_static! {
    static ref GLOBAL_CANCELLATION_MANAGER: Mutex<CancellationManager> =
        Mutex::new(CancellationManager::new());
}

#[wasm_bindgen]
pub fn create_cancellation_token(id: &str) -> String {
    GLOBAL_CANCELLATION_MANAGER.lock().create_token(id).id
}

#[wasm_bindgen]
pub fn cancel_operation(id: &str) -> bool {
    GLOBAL_CANCELLATION_MANAGER.lock().cancel_token(id)
}

#[wasm_bindgen]
pub fn cleanup_cancellation_token(id: &str) -> bool {
    GLOBAL_CANCELLATION_MANAGER.lock().cleanup_token(id);
    true
}

pub fn get_cancellation_token(id: &str) -> Option<CancellationToken> {
    GLOBAL_CANCELLATION_MANAGER.lock().get_token(id).cloned()
}
