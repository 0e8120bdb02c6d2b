use lazy_static::lazy_static;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::console_log;
use crate::models::CacheStats;
use crate::provider::OsmProvider;
use crate::shape::Shape;

pub const DEFAULT_MAX_DOCUMENTS: usize = 16;

/// A loaded document and, once processed, the shapes it produced.
pub struct CachedDocument {
    pub provider: Arc<OsmProvider>,
    pub shapes: Option<Vec<Arc<Shape>>>,
    generation: u64,
}

// Module state to keep loaded documents between calls from JS
pub struct ModuleState {
    pub documents: HashMap<String, CachedDocument>,
    pub max_documents: usize,

    // Stats
    pub cache_hits: usize,
    pub cache_misses: usize,

    generation: u64,
}

lazy_static! {
    static ref MODULE_STATE: ReentrantMutex<RefCell<ModuleState>> =
        ReentrantMutex::new(RefCell::new(ModuleState::new()));
}

impl Default for ModuleState {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleState {
    pub fn new() -> Self {
        ModuleState {
            documents: HashMap::new(),
            max_documents: DEFAULT_MAX_DOCUMENTS,
            cache_hits: 0,
            cache_misses: 0,
            generation: 0,
        }
    }

    pub fn with_mut<F, R>(f: F) -> R
    where
        F: FnOnce(&mut ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let mut borrow = guard.borrow_mut();
        f(&mut borrow)
    }

    pub fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let borrow = guard.borrow();
        f(&borrow)
    }

    /// Stores a document, evicting the oldest entry when the cache is full.
    /// Re-storing an existing key replaces it and drops its shapes.
    pub fn store_document(&mut self, key: &str, provider: Arc<OsmProvider>) {
        if self.documents.len() >= self.max_documents && !self.documents.contains_key(key) {
            let oldest = self
                .documents
                .iter()
                .min_by_key(|(_, cached)| cached.generation)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                console_log!("Evicting cached document {}", oldest);
                self.documents.remove(&oldest);
            }
        }

        self.generation += 1;
        self.documents.insert(
            key.to_string(),
            CachedDocument {
                provider,
                shapes: None,
                generation: self.generation,
            },
        );
    }

    pub fn get_document(&mut self, key: &str) -> Option<Arc<OsmProvider>> {
        match self.documents.get(key) {
            Some(cached) => {
                self.cache_hits += 1;
                Some(Arc::clone(&cached.provider))
            }
            None => {
                self.cache_misses += 1;
                None
            }
        }
    }

    /// Remembers the shapes produced for `key`. Ignored if the document
    /// was evicted in the meantime.
    pub fn store_shapes(&mut self, key: &str, shapes: Vec<Arc<Shape>>) {
        if let Some(cached) = self.documents.get_mut(key) {
            cached.shapes = Some(shapes);
        }
    }

    pub fn get_shape(&self, key: &str, index: usize) -> Option<Arc<Shape>> {
        self.documents
            .get(key)
            .and_then(|cached| cached.shapes.as_ref())
            .and_then(|shapes| shapes.get(index))
            .cloned()
    }

    pub fn remove_document(&mut self, key: &str) -> bool {
        self.documents.remove(key).is_some()
    }

    pub fn get_stats(&self) -> CacheStats {
        let total_requests = self.cache_hits + self.cache_misses;
        let hit_rate = if total_requests > 0 {
            self.cache_hits as f64 / total_requests as f64
        } else {
            0.0
        };
        CacheStats {
            documents_count: self.documents.len(),
            max_documents: self.max_documents,
            total_requests,
            hit_rate,
        }
    }

    pub fn clear_all_caches(&mut self) {
        self.documents.clear();
        self.cache_hits = 0;
        self.cache_misses = 0;
    }
}
