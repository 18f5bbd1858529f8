use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Last time a human spoke in each channel, bounded to the most recent channels.
#[derive(Clone)]
pub struct ChannelActivity {
    cache: Arc<Mutex<LruCache<u64, Instant>>>,
}

impl ChannelActivity {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn record(&self, channel_id: u64, at: Instant) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(channel_id, at);
        }
    }

    pub fn last_seen(&self, channel_id: u64) -> Option<Instant> {
        self.cache.lock().ok()?.get(&channel_id).copied()
    }

    /// No human message within `window` (unknown channels count as quiet).
    pub fn is_quiet(&self, channel_id: u64, window: Duration, now: Instant) -> bool {
        match self.last_seen(channel_id) {
            Some(at) => now.saturating_duration_since(at) >= window,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_window() {
        let activity = ChannelActivity::new(10);
        let start = Instant::now();
        let window = Duration::from_secs(60);
        assert!(activity.is_quiet(1, window, start));

        activity.record(1, start);
        assert!(!activity.is_quiet(1, window, start + Duration::from_secs(30)));
        assert!(activity.is_quiet(1, window, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let activity = ChannelActivity::new(2);
        let now = Instant::now();
        activity.record(1, now);
        activity.record(2, now);
        assert!(activity.last_seen(1).is_some());

        // 2 is now least recently used
        activity.record(3, now);
        assert!(activity.last_seen(2).is_none());
        assert!(activity.last_seen(1).is_some());
        assert!(activity.last_seen(3).is_some());
    }
}
