use crate::errors::{AppError, AppResult};
use crate::models::BriefKind;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn chat_key(agent_id: &str) -> String {
    format!("chat:{}", agent_id)
}

pub fn brief_key(kind: BriefKind) -> String {
    format!("brief:{}", kind.as_str())
}

#[derive(Default)]
struct InflightState {
    active: HashMap<String, Arc<AtomicBool>>,
    errors: BTreeMap<String, String>,
}

/// Tracks requests that are awaiting a provider, one per key, plus the last
/// failure per key for the view's inline error banner.
#[derive(Clone, Default)]
pub struct InflightRegistry {
    state: Arc<Mutex<InflightState>>,
}

/// Held for the lifetime of one request; dropping it clears the loading flag.
pub struct InflightGuard {
    registry: InflightRegistry,
    key: String,
    canceled: Arc<AtomicBool>,
}

impl InflightGuard {
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.registry.state.lock() {
            let owned = state
                .active
                .get(&self.key)
                .is_some_and(|token| Arc::ptr_eq(token, &self.canceled));
            if owned {
                state.active.remove(&self.key);
            }
        }
    }
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, InflightState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("inflight registry mutex poisoned".to_string()))
    }

    /// Claims `key`, or fails with `Busy` while another request holds it.
    pub fn try_begin(&self, key: &str) -> AppResult<InflightGuard> {
        let mut state = self.lock()?;
        if state.active.contains_key(key) {
            return Err(AppError::Busy(format!("Request already in flight for {}", key)));
        }
        let canceled = Arc::new(AtomicBool::new(false));
        state.active.insert(key.to_string(), canceled.clone());
        state.errors.remove(key);
        Ok(InflightGuard {
            registry: self.clone(),
            key: key.to_string(),
            canceled,
        })
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.lock()
            .map(|state| state.active.contains_key(key))
            .unwrap_or(false)
    }

    /// Flags the in-flight request for `key` so its result is discarded.
    pub fn cancel(&self, key: &str) -> bool {
        let Ok(state) = self.lock() else {
            return false;
        };
        match state.active.get(key) {
            Some(token) => {
                token.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn record_error(&self, key: &str, message: impl Into<String>) {
        if let Ok(mut state) = self.lock() {
            state.errors.insert(key.to_string(), message.into());
        }
    }

    pub fn clear_error(&self, key: &str) -> bool {
        self.lock()
            .map(|mut state| state.errors.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn loading_keys(&self) -> Vec<String> {
        let mut keys = self
            .lock()
            .map(|state| state.active.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn errors(&self) -> BTreeMap<String, String> {
        self.lock().map(|state| state.errors.clone()).unwrap_or_default()
    }
}
