//! Process-wide hit/miss statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug)]
pub struct CacheStatsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    hit_latency_us: AtomicU64,
    miss_latency_us: AtomicU64,
    started_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub average_hit_latency_ms: f64,
    pub average_miss_latency_ms: f64,
    #[serde(rename = "startedAtUtc", with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

impl CacheStatsSnapshot {
    /// `hits / (hits + misses)`, zero before any traffic.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl Default for CacheStatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStatsCollector {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            hit_latency_us: AtomicU64::new(0),
            miss_latency_us: AtomicU64::new(0),
            started_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn record_hit(&self, latency: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.hit_latency_us
            .fetch_add(micros(latency), Ordering::Relaxed);
        metrics::counter!("talentdesk_cache_hit_total").increment(1);
        metrics::histogram!("talentdesk_cache_lookup_ms", "outcome" => "hit")
            .record(latency.as_secs_f64() * 1000.0);
    }

    pub fn record_miss(&self, latency: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.miss_latency_us
            .fetch_add(micros(latency), Ordering::Relaxed);
        metrics::counter!("talentdesk_cache_miss_total").increment(1);
        metrics::histogram!("talentdesk_cache_lookup_ms", "outcome" => "miss")
            .record(latency.as_secs_f64() * 1000.0);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStatsSnapshot {
            hits,
            misses,
            average_hit_latency_ms: average_ms(self.hit_latency_us.load(Ordering::Relaxed), hits),
            average_miss_latency_ms: average_ms(
                self.miss_latency_us.load(Ordering::Relaxed),
                misses,
            ),
            started_at: self.started_at,
        }
    }
}

fn micros(latency: Duration) -> u64 {
    u64::try_from(latency.as_micros()).unwrap_or(u64::MAX)
}

fn average_ms(total_us: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_us as f64 / count as f64 / 1000.0
    }
}
