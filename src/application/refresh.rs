// Refresh coordination - render coalescing and stale response discard
use crate::application::host::StateSnapshot;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

/// Key describing everything a render depends on for a set of entities.
pub fn render_key(entity_ids: &[String], snapshot: &StateSnapshot) -> String {
    entity_ids
        .iter()
        .map(|eid| match snapshot.get(eid) {
            Some(st) => format!(
                "{}:{}:{}:{}",
                eid,
                st.state,
                st.attributes.unit_of_measurement.as_deref().unwrap_or(""),
                st.last_changed.as_deref().unwrap_or("")
            ),
            None => format!("{}:missing", eid),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Skips renders whose inputs have not changed since the last one.
#[derive(Debug, Default)]
pub struct RenderGate {
    last_key: Option<String>,
}

impl RenderGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_render(&mut self, key: String) -> bool {
        if self.last_key.as_ref() == Some(&key) {
            return false;
        }
        self.last_key = Some(key);
        true
    }

    /// Force the next call to render, e.g. after a configuration change.
    pub fn invalidate(&mut self) {
        self.last_key = None;
    }
}

/// Collapses bursts of render requests into one unit of work.
#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: AtomicBool,
    notify: Notify,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a render. Returns false if one was already pending.
    pub fn request(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_one();
        true
    }

    /// Wait for the next scheduled render and claim it.
    pub async fn next(&self) {
        self.notify.notified().await;
        self.pending.store(false, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Monotonic tokens for requests where only the latest response matters.
#[derive(Debug, Default)]
pub struct RequestTokens {
    latest: AtomicU64,
}

impl RequestTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.latest.load(Ordering::Acquire) == token
    }

    /// Keep `value` only if `token` is still the latest issued.
    pub fn accept<T>(&self, token: u64, value: T) -> Option<T> {
        if self.is_current(token) {
            Some(value)
        } else {
            tracing::debug!("Discarding stale response for request {}", token);
            None
        }
    }
}
