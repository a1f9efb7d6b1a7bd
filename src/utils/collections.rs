//! Constructors for the hash collections used throughout the crate.
//!
//! Centralizing these keeps call sites free of turbofish noise and makes the
//! hasher choice (`rustc-hash`) a single-line decision.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// New empty metadata map for [`DependencyEdge`](crate::graphs::DependencyEdge)
/// and report payloads.
#[must_use]
pub fn new_metadata_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}
