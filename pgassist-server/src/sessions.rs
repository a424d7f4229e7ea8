//! In-memory session store and the idle-session sweep.
//!
//! Each entry owns a `SessionContext` behind its own async mutex, so connect
//! and ask on one session run one at a time while other sessions proceed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pgassist_core::config::SessionConfig;
use pgassist_core::SessionContext;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

pub struct SessionEntry {
    pub id: Uuid,
    pub context: Mutex<SessionContext>,
    last_active: std::sync::Mutex<DateTime<Utc>>,
}

impl SessionEntry {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            context: Mutex::new(SessionContext::new()),
            last_active: std::sync::Mutex::new(Utc::now()),
        }
    }

    pub fn touch(&self) {
        if let Ok(mut last) = self.last_active.lock() {
            *last = Utc::now();
        }
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
            .lock()
            .map(|last| *last)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Arc<SessionEntry> {
        let entry = Arc::new(SessionEntry::new(Uuid::new_v4()));
        self.sessions.write().await.insert(entry.id, entry.clone());
        tracing::info!(session_id = %entry.id, "Session created");
        entry
    }

    /// Look up a session and mark it active.
    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionEntry>> {
        let entry = self.sessions.read().await.get(&id).cloned()?;
        entry.touch();
        Some(entry)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every session idle since before `cutoff`. Returns how many went.
    pub async fn remove_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = entry.last_active() >= cutoff;
            if !keep {
                tracing::info!(session_id = %id, "Session expired");
            }
            keep
        });
        before - sessions.len()
    }
}

/// Periodically drop idle sessions until shutdown fires.
pub async fn run_session_sweep(
    store: Arc<SessionStore>,
    config: SessionConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.sweep_interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let idle = chrono::Duration::minutes(config.idle_timeout_minutes as i64);

    tracing::info!(
        "Session sweep started (idle timeout: {}min)",
        config.idle_timeout_minutes
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = store.remove_idle(Utc::now() - idle).await;
                if removed > 0 {
                    let remaining = store.len().await;
                    tracing::info!(removed, remaining, "Idle sessions swept");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Session sweep shutting down");
                break;
            }
        }
    }
}
