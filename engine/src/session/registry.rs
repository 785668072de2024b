use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cancellation tokens of the sessions that are streaming right now
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
    next_id: Arc<AtomicU64>,
}

#[derive(Debug)]
struct Entry {
    id: u64,
    token: CancellationToken,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a run under `session_id`. The entry lives until the guard is
    /// dropped. A second run of the same session replaces the first entry.
    pub fn register(&self, session_id: &str) -> SessionGuard {
        let token = CancellationToken::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            token: token.clone(),
        };
        if let Some(previous) = self.lock().insert(session_id.to_string(), entry) {
            debug!("Session {} re-registered, cancelling previous run", session_id);
            previous.token.cancel();
        }

        SessionGuard {
            registry: self.clone(),
            session_id: session_id.to_string(),
            id,
            token,
        }
    }

    /// Signal the run of `session_id`. Returns false when no run is live.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.lock().get(session_id) {
            Some(entry) => {
                info!("Cancelling session {}", session_id);
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // Every critical section is a single map operation
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Keeps a session registered while a stream is alive
#[derive(Debug)]
pub struct SessionGuard {
    registry: SessionRegistry,
    session_id: String,
    id: u64,
    token: CancellationToken,
}

impl SessionGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut sessions = self.registry.lock();
        // Only remove our own entry; a newer run may have replaced it
        if sessions.get(&self.session_id).map(|e| e.id) == Some(self.id) {
            sessions.remove(&self.session_id);
            debug!("Session {} unregistered", self.session_id);
        }
    }
}
