//! Geometry Hasher
//!
//! Stable per-edge identity hash used for change detection by the
//! incremental update path.
//!
//! The hash mixes the edge's shape identity, the name of its curve type and
//! its parameter range. Two edges with equal hashes are treated as
//! geometrically identical; the geometry itself is never compared.

use std::sync::Arc;

use crate::domain::ports::Edge;

/// Identity hash of a single edge
pub type EdgeHash = u64;

const SEED: u64 = 0x517cc1b727220a95;

/// Fast non-cryptographic hash (FxHash algorithm)
#[inline]
pub(crate) fn fx_hash(bytes: &[u8]) -> u64 {
    let mut hash = SEED;
    for &byte in bytes {
        hash = hash.rotate_left(5) ^ (byte as u64);
        hash = hash.wrapping_mul(SEED);
    }
    hash
}

/// XOR-style hash combine
#[inline]
fn combine(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_add(0x9e3779b97f4a7c15)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Hash a single edge.
///
/// O(1) kernel calls. Without a curve only the shape-identity term is used.
pub fn hash_edge(edge: &dyn Edge) -> EdgeHash {
    let mut hash = edge.shape_identity();

    if let Some(curve) = edge.curve() {
        let (first, last) = curve.parameter_range();
        hash = combine(hash, fx_hash(curve.type_name().as_bytes()));
        hash = combine(hash, fx_hash(&first.to_bits().to_le_bytes()));
        hash = combine(hash, fx_hash(&last.to_bits().to_le_bytes()));
    }

    hash
}

/// Hash every edge of a list, preserving positions
pub fn hash_edges(edges: &[Arc<dyn Edge>]) -> Vec<EdgeHash> {
    edges.iter().map(|edge| hash_edge(edge.as_ref())).collect()
}

// =============================================================================
// Tests
// =============================================================================
