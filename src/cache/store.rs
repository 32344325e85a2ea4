//! Edge Geometry Cache
//!
//! Two-tier cache for sampled edge geometry and edge-edge intersection
//! results, sharing one memory budget.
//!
//! # Locking protocol
//!
//! Every map mutation happens under a single mutex. Compute closures always
//! run with the lock released:
//!
//! ```text
//! lock → lookup → unlock → compute → lock → re-check → insert-or-discard
//! ```
//!
//! Concurrent misses on the same key may therefore each run their closure.
//! Only the first result to reach the re-check is installed; later ones are
//! returned to their callers and dropped from the cache's point of view.
//! Compute closures must be pure and side-effect free for this reason.

use std::collections::HashMap;
use std::convert::Infallible;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::entry::{CacheEntry, EdgeIntersection, IntersectionCacheEntry};
use super::hasher::EdgeHash;
use super::memory::MemoryAccountant;
use super::metrics::{CacheMetrics, CacheStats};
use super::policy::CacheConfig;
use crate::domain::ports::IntersectionStore;
use crate::geometry::Point;

/// Which map an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Tier {
    Geometry,
    Intersection,
}

/// State guarded by the cache mutex
#[derive(Debug, Default)]
pub(super) struct CacheState {
    pub(super) geometry: HashMap<String, CacheEntry>,
    pub(super) intersections: HashMap<String, IntersectionCacheEntry>,
    pub(super) total_memory: usize,
}

impl CacheState {
    fn remove_geometry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.geometry.remove(key)?;
        self.total_memory -= entry.memory_usage;
        Some(entry)
    }

    pub(super) fn remove_intersection(&mut self, key: &str) -> Option<IntersectionCacheEntry> {
        let entry = self.intersections.remove(key)?;
        self.total_memory -= entry.memory_usage;
        Some(entry)
    }

    fn insert_geometry(&mut self, key: String, entry: CacheEntry) {
        self.total_memory += entry.memory_usage;
        if let Some(old) = self.geometry.insert(key, entry) {
            self.total_memory -= old.memory_usage;
        }
    }

    fn insert_intersection(&mut self, key: String, entry: IntersectionCacheEntry) {
        self.total_memory += entry.memory_usage;
        if let Some(old) = self.intersections.insert(key, entry) {
            self.total_memory -= old.memory_usage;
        }
    }

    /// Least recently accessed entry across both tiers (linear scan)
    fn oldest(&self) -> Option<(Tier, String)> {
        let geometry = self
            .geometry
            .iter()
            .map(|(k, e)| (e.last_access, Tier::Geometry, k));
        let intersections = self
            .intersections
            .iter()
            .map(|(k, e)| (e.last_access, Tier::Intersection, k));

        geometry
            .chain(intersections)
            .min_by_key(|(last_access, _, _)| *last_access)
            .map(|(_, tier, key)| (tier, key.clone()))
    }

    fn evict_oldest(&mut self) -> Option<(Tier, String)> {
        let (tier, key) = self.oldest()?;
        match tier {
            Tier::Geometry => self.remove_geometry(&key).map(|_| ()),
            Tier::Intersection => self.remove_intersection(&key).map(|_| ()),
        }?;
        Some((tier, key))
    }

    /// Evict LRU entries until `candidate` fits. Returns false when it can
    /// never fit, in which case nothing is evicted.
    fn make_room(&mut self, candidate: usize, budget: usize, metrics: &CacheMetrics) -> bool {
        if candidate > budget {
            return false;
        }
        while MemoryAccountant::should_evict(self.total_memory, candidate, budget) {
            match self.evict_oldest() {
                Some((tier, key)) => {
                    metrics.record_eviction();
                    debug!(key = %key, tier = ?tier, "Evicted entry under memory pressure");
                }
                None => break,
            }
        }
        !MemoryAccountant::should_evict(self.total_memory, candidate, budget)
    }

    fn entry_count(&self) -> usize {
        self.geometry.len() + self.intersections.len()
    }
}

/// Two-tier edge geometry / intersection cache.
///
/// Constructed explicitly and shared through `Arc`; there is no global
/// instance.
#[derive(Debug)]
pub struct EdgeGeometryCache {
    pub(super) state: Mutex<CacheState>,
    config: CacheConfig,
    metrics: CacheMetrics,
}

impl Default for EdgeGeometryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeGeometryCache {
    /// Create a cache with default configuration
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a cache with custom configuration
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            config,
            metrics: CacheMetrics::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // =========================================================================
    // Geometry Tier
    // =========================================================================

    /// Get cached edge geometry or compute and install it.
    ///
    /// `compute` runs without the lock held and may run more than once per
    /// key under concurrent misses.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> Vec<Point>
    where
        F: FnOnce() -> Vec<Point>,
    {
        self.get_or_compute_for_shape(key, 0, compute)
    }

    /// Like [`get_or_compute`](Self::get_or_compute), tagging the entry with
    /// the shape it belongs to
    pub fn get_or_compute_for_shape<F>(&self, key: &str, shape_hash: u64, compute: F) -> Vec<Point>
    where
        F: FnOnce() -> Vec<Point>,
    {
        match self.try_get_or_compute(key, shape_hash, || Ok::<_, Infallible>(compute())) {
            Ok(points) => points,
            Err(never) => match never {},
        }
    }

    /// Fallible variant; a compute error propagates unchanged and nothing is
    /// cached
    pub fn try_get_or_compute<F, E>(
        &self,
        key: &str,
        shape_hash: u64,
        compute: F,
    ) -> Result<Vec<Point>, E>
    where
        F: FnOnce() -> Result<Vec<Point>, E>,
    {
        {
            let mut state = self.state.lock();
            if let Some(entry) = state.geometry.get_mut(key) {
                entry.touch();
                self.metrics.record_geometry_hit();
                return Ok(entry.points.clone());
            }
        }
        self.metrics.record_geometry_miss();
        debug!(key = %key, "Geometry cache miss");

        let points = compute()?;
        let entry = CacheEntry::new(points.clone(), shape_hash);

        let mut state = self.state.lock();
        if state.geometry.contains_key(key) {
            self.metrics.record_discarded_insert();
            debug!(key = %key, "Concurrent geometry insert won; discarding result");
            return Ok(points);
        }
        if state.make_room(entry.memory_usage, self.config.memory_budget_bytes, &self.metrics) {
            state.insert_geometry(key.to_string(), entry);
        } else {
            warn!(
                key = %key,
                size = entry.memory_usage,
                budget = self.config.memory_budget_bytes,
                "Geometry entry exceeds memory budget; not cached"
            );
        }
        Ok(points)
    }

    /// Remove a geometry entry. No-op when absent.
    pub fn invalidate(&self, key: &str) {
        let mut state = self.state.lock();
        if state.remove_geometry(key).is_some() {
            debug!(key = %key, "Invalidated geometry entry");
        }
    }

    // =========================================================================
    // Intersection Tier
    // =========================================================================

    /// Get cached intersections or compute and install them.
    ///
    /// A hit requires the stored tolerance to be within 1e-9 of `tolerance`;
    /// a mismatching entry is removed before recomputing.
    pub fn get_or_compute_intersections<F>(
        &self,
        key: &str,
        compute: F,
        shape_hash: u64,
        tolerance: f64,
    ) -> Vec<Point>
    where
        F: FnOnce() -> Vec<Point>,
    {
        match self.try_get_or_compute_intersections(
            key,
            || Ok::<_, Infallible>(compute()),
            shape_hash,
            tolerance,
        ) {
            Ok(points) => points,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of
    /// [`get_or_compute_intersections`](Self::get_or_compute_intersections)
    pub fn try_get_or_compute_intersections<F, E>(
        &self,
        key: &str,
        compute: F,
        shape_hash: u64,
        tolerance: f64,
    ) -> Result<Vec<Point>, E>
    where
        F: FnOnce() -> Result<Vec<Point>, E>,
    {
        {
            let mut state = self.state.lock();
            let mut stale = false;
            if let Some(entry) = state.intersections.get_mut(key) {
                if entry.matches_tolerance(tolerance) {
                    entry.touch();
                    self.metrics.record_intersection_hit();
                    return Ok(entry.intersection_points.clone());
                }
                stale = true;
            }
            if stale {
                state.remove_intersection(key);
                debug!(key = %key, tolerance, "Tolerance changed; dropped stale intersection entry");
            }
        }
        self.metrics.record_intersection_miss();

        let started = Instant::now();
        let points = compute()?;
        let elapsed = started.elapsed().as_secs_f64();

        let entry = IntersectionCacheEntry::new(points.clone(), shape_hash, tolerance)
            .with_computation_time(elapsed);

        let mut state = self.state.lock();
        if state.intersections.contains_key(key) {
            self.metrics.record_discarded_insert();
            debug!(key = %key, "Concurrent intersection insert won; discarding result");
            return Ok(points);
        }
        if state.make_room(entry.memory_usage, self.config.memory_budget_bytes, &self.metrics) {
            debug!(
                key = %key,
                points = points.len(),
                seconds = elapsed,
                "Cached intersection result"
            );
            state.insert_intersection(key.to_string(), entry);
        } else {
            warn!(key = %key, size = entry.memory_usage, "Intersection entry exceeds memory budget; not cached");
        }
        Ok(points)
    }

    /// Lookup without compute fallback. Counts a hit or a miss.
    pub fn try_get_cached(&self, key: &str) -> Option<Vec<Point>> {
        let mut state = self.state.lock();
        match state.intersections.get_mut(key) {
            Some(entry) => {
                entry.touch();
                self.metrics.record_intersection_hit();
                Some(entry.intersection_points.clone())
            }
            None => {
                self.metrics.record_intersection_miss();
                None
            }
        }
    }

    /// Unconditional upsert of an intersection result
    pub fn store_cached(&self, key: &str, points: Vec<Point>, shape_hash: u64, tolerance: f64) {
        self.upsert_intersection(key, IntersectionCacheEntry::new(points, shape_hash, tolerance));
    }

    /// Upsert an intersection result together with the per-edge metadata the
    /// incremental path needs.
    ///
    /// [`update_intersections_incremental`](Self::update_intersections_incremental)
    /// never writes back; callers re-store its merged result through here.
    pub fn store_cached_with_edges(
        &self,
        key: &str,
        points: Vec<Point>,
        shape_hash: u64,
        tolerance: f64,
        edge_intersections: Vec<EdgeIntersection>,
        edge_hashes: Vec<EdgeHash>,
    ) {
        self.upsert_intersection(
            key,
            IntersectionCacheEntry::with_edges(
                points,
                shape_hash,
                tolerance,
                edge_intersections,
                edge_hashes,
            ),
        );
    }

    fn upsert_intersection(&self, key: &str, entry: IntersectionCacheEntry) {
        let mut state = self.state.lock();
        state.remove_intersection(key);
        if state.make_room(entry.memory_usage, self.config.memory_budget_bytes, &self.metrics) {
            state.insert_intersection(key.to_string(), entry);
        } else {
            warn!(key = %key, size = entry.memory_usage, "Intersection entry exceeds memory budget; not cached");
        }
    }

    /// Snapshot of an intersection entry's metadata (no stats side effect)
    pub fn intersection_entry(&self, key: &str) -> Option<IntersectionCacheEntry> {
        self.state.lock().intersections.get(key).cloned()
    }

    /// Remove an intersection entry by key. No-op when absent.
    pub fn invalidate_intersection(&self, key: &str) {
        self.state.lock().remove_intersection(key);
    }

    /// Remove every intersection entry computed for `shape_hash`.
    /// Returns the number of entries removed.
    pub fn invalidate_intersections(&self, shape_hash: u64) -> usize {
        let mut state = self.state.lock();
        let keys: Vec<String> = state
            .intersections
            .iter()
            .filter(|(_, e)| e.shape_hash == shape_hash)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            state.remove_intersection(key);
        }
        if !keys.is_empty() {
            info!(shape_hash, removed = keys.len(), "Invalidated intersections for shape");
        }
        keys.len()
    }

    /// Remove every entry of either tier tagged with `shape_hash`
    pub fn invalidate_shape(&self, shape_hash: u64) -> usize {
        let removed_intersections = self.invalidate_intersections(shape_hash);

        let mut state = self.state.lock();
        let keys: Vec<String> = state
            .geometry
            .iter()
            .filter(|(_, e)| e.shape_hash == shape_hash)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            state.remove_geometry(key);
        }
        removed_intersections + keys.len()
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Remove every entry not accessed within `max_age`.
    /// Returns the number of entries removed.
    pub fn evict_old_entries(&self, max_age: Duration) -> usize {
        let mut state = self.state.lock();

        let stale_geometry: Vec<String> = state
            .geometry
            .iter()
            .filter(|(_, e)| CacheConfig::is_stale(e.age(), max_age))
            .map(|(k, _)| k.clone())
            .collect();
        let stale_intersections: Vec<String> = state
            .intersections
            .iter()
            .filter(|(_, e)| CacheConfig::is_stale(e.age(), max_age))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &stale_geometry {
            state.remove_geometry(key);
            self.metrics.record_eviction();
        }
        for key in &stale_intersections {
            state.remove_intersection(key);
            self.metrics.record_eviction();
        }

        let removed = stale_geometry.len() + stale_intersections.len();
        if removed > 0 {
            info!(removed, max_age_secs = max_age.as_secs_f64(), "Evicted stale cache entries");
        }
        removed
    }

    /// Evict entries older than the configured `max_entry_age`
    pub fn evict_stale(&self) -> usize {
        self.evict_old_entries(self.config.max_entry_age)
    }

    /// Remove the single least recently accessed entry.
    /// Returns false when the cache is empty.
    pub fn evict_lru(&self) -> bool {
        let mut state = self.state.lock();
        match state.evict_oldest() {
            Some((tier, key)) => {
                self.metrics.record_eviction();
                debug!(key = %key, tier = ?tier, "Evicted LRU entry");
                true
            }
            None => false,
        }
    }

    /// Remove all entries and reset hit/miss counters
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let removed = state.entry_count();
        state.geometry.clear();
        state.intersections.clear();
        state.total_memory = 0;
        self.metrics.reset();
        info!(removed, "Cleared edge geometry cache");
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn hit_count(&self) -> u64 {
        self.metrics.hits()
    }

    pub fn miss_count(&self) -> u64 {
        self.metrics.misses()
    }

    pub fn hit_rate(&self) -> f64 {
        self.metrics.hit_rate()
    }

    /// Entries across both tiers
    pub fn entry_count(&self) -> usize {
        self.state.lock().entry_count()
    }

    /// Estimated bytes held across both tiers
    pub fn total_memory_usage(&self) -> usize {
        self.state.lock().total_memory
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: self.metrics.hits(),
            misses: self.metrics.misses(),
            hit_rate: self.metrics.hit_rate(),
            geometry_hits: self.metrics.geometry_hits(),
            geometry_misses: self.metrics.geometry_misses(),
            intersection_hits: self.metrics.intersection_hits(),
            intersection_misses: self.metrics.intersection_misses(),
            geometry_entries: state.geometry.len(),
            intersection_entries: state.intersections.len(),
            total_memory_bytes: state.total_memory,
            memory_budget_bytes: self.config.memory_budget_bytes,
            evictions: self.metrics.evictions(),
            discarded_inserts: self.metrics.discarded_inserts(),
        }
    }

    /// Whether the geometry tier holds `key` (no stats side effect)
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().geometry.contains_key(key)
    }

    /// Whether the intersection tier holds `key` (no stats side effect)
    pub fn contains_intersections(&self, key: &str) -> bool {
        self.state.lock().intersections.contains_key(key)
    }
}

impl IntersectionStore for EdgeGeometryCache {
    fn try_get_cached(&self, key: &str) -> Option<Vec<Point>> {
        EdgeGeometryCache::try_get_cached(self, key)
    }

    fn store_cached(&self, key: &str, points: Vec<Point>, shape_hash: u64, tolerance: f64) {
        EdgeGeometryCache::store_cached(self, key, points, shape_hash, tolerance)
    }
}

// =============================================================================
// Tests
// =============================================================================
