// TTL cache for computed report results.

use super::types::ReportResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Keeps computed reports for a short window so dashboard refreshes do
/// not recompute aggregates on every request.
pub struct ReportCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, ReportResult)>>,
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<ReportResult> {
        let entries = self.entries.read();
        let (stored_at, result) = entries.get(key)?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        debug!("Report cache hit for {}", key);
        Some(result.clone())
    }

    pub fn set(&self, key: String, result: ReportResult) {
        let mut entries = self.entries.write();
        // Stale entries are dropped lazily whenever something new lands.
        let ttl = self.ttl;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() <= ttl);
        entries.insert(key, (Instant::now(), result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::types::ReportResult;

    fn empty_result() -> ReportResult {
        ReportResult {
            columns: vec![],
            rows: vec![],
            message: None,
            chart: None,
        }
    }

    #[test]
    fn test_roundtrip() {
        let cache = ReportCache::new(Duration::from_secs(60));
        assert!(cache.get("volume").is_none());
        cache.set("volume".to_string(), empty_result());
        assert!(cache.get("volume").is_some());
    }

    #[test]
    fn test_expiry() {
        let cache = ReportCache::new(Duration::from_millis(0));
        cache.set("volume".to_string(), empty_result());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("volume").is_none());
    }
}
