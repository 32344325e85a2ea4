//! Cache Metrics Collection
//!
//! Hit/miss/eviction counters. These are eventually-consistent counters for
//! monitoring and are never used for correctness.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    geometry_hits: AtomicU64,
    geometry_misses: AtomicU64,
    intersection_hits: AtomicU64,
    intersection_misses: AtomicU64,
    evictions: AtomicU64,
    discarded_inserts: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // Geometry tier
    pub fn record_geometry_hit(&self) {
        self.geometry_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_geometry_miss(&self) {
        self.geometry_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn geometry_hits(&self) -> u64 {
        self.geometry_hits.load(Ordering::Relaxed)
    }

    pub fn geometry_misses(&self) -> u64 {
        self.geometry_misses.load(Ordering::Relaxed)
    }

    // Intersection tier
    pub fn record_intersection_hit(&self) {
        self.intersection_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_intersection_miss(&self) {
        self.intersection_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn intersection_hits(&self) -> u64 {
        self.intersection_hits.load(Ordering::Relaxed)
    }

    pub fn intersection_misses(&self) -> u64 {
        self.intersection_misses.load(Ordering::Relaxed)
    }

    // Eviction
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// A concurrent winner had already installed the key
    pub fn record_discarded_insert(&self) {
        self.discarded_inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded_inserts(&self) -> u64 {
        self.discarded_inserts.load(Ordering::Relaxed)
    }

    /// Total hits across both tiers
    pub fn hits(&self) -> u64 {
        self.geometry_hits() + self.intersection_hits()
    }

    /// Total misses across both tiers
    pub fn misses(&self) -> u64 {
        self.geometry_misses() + self.intersection_misses()
    }

    /// `hits / (hits + misses)`, 0 when nothing was accessed
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Reset hit/miss counters
    pub fn reset(&self) {
        self.geometry_hits.store(0, Ordering::Relaxed);
        self.geometry_misses.store(0, Ordering::Relaxed);
        self.intersection_hits.store(0, Ordering::Relaxed);
        self.intersection_misses.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub geometry_hits: u64,
    pub geometry_misses: u64,
    pub intersection_hits: u64,
    pub intersection_misses: u64,
    pub geometry_entries: usize,
    pub intersection_entries: usize,
    pub total_memory_bytes: usize,
    pub memory_budget_bytes: usize,
    pub evictions: u64,
    pub discarded_inserts: u64,
}

impl CacheStats {
    /// Entries across both tiers
    pub fn entries(&self) -> usize {
        self.geometry_entries + self.intersection_entries
    }

    /// Fraction of the budget in use (0.0 - 1.0)
    pub fn utilization(&self) -> f64 {
        if self.memory_budget_bytes == 0 {
            0.0
        } else {
            self.total_memory_bytes as f64 / self.memory_budget_bytes as f64
        }
    }
}
