// Bounded LRU cache of historical samples with a freshness window
use crate::domain::telemetry::HistorySample;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_CAPACITY: usize = 30;
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60);

/// Cache key for an entity and window length, e.g. `sensor.co2|24`
pub fn cache_key(entity_id: &str, hours: u32) -> String {
    format!("{}|{}", entity_id, hours)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    points: Arc<Vec<HistorySample>>,
    fetched_at: Instant,
}

#[derive(Debug)]
pub struct HistoryCache {
    capacity: usize,
    freshness: Duration,
    entries: HashMap<String, CacheEntry>,
    // Least recently used at the front.
    order: VecDeque<String>,
}

impl HistoryCache {
    pub fn new(capacity: usize, freshness: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            freshness,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Return the entry if it is younger than the freshness window, marking
    /// it most recently used. Stale entries stay until they are replaced.
    pub fn get_fresh(&mut self, key: &str, now: Instant) -> Option<Arc<Vec<HistorySample>>> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.fetched_at) >= self.freshness {
            return None;
        }
        let points = entry.points.clone();
        self.touch(key);
        Some(points)
    }

    /// Store an entry and return the keys evicted to stay within capacity.
    pub fn insert(
        &mut self,
        key: String,
        points: Arc<Vec<HistorySample>>,
        now: Instant,
    ) -> Vec<String> {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        }
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                points,
                fetched_at: now,
            },
        );

        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            evicted.push(oldest);
        }
        evicted
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

impl Default for HistoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_FRESHNESS)
    }
}
