//! Least-in-flight selection policy.
//!
//! Orders candidates by in-flight count ascending; ties are broken by a
//! rotating round-robin cursor so equal-load backends share work instead
//! of the first one absorbing every cold-start request.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::registry::Backend;

/// Least-in-flight selector with round-robin tie-breaking.
#[derive(Debug, Default)]
pub struct LeastInFlight {
    cursor: AtomicUsize,
}

impl LeastInFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the candidates in selection order over a snapshot.
    ///
    /// The stable sort keeps the rotated order among equal in-flight
    /// counts, which is exactly the round-robin tie-break.
    pub fn candidates(&self, backends: &[Arc<Backend>]) -> Vec<Arc<Backend>> {
        if backends.is_empty() {
            return Vec::new();
        }

        let len = backends.len();
        let offset = self.cursor.fetch_add(1, Ordering::Relaxed) % len;

        let mut ordered: Vec<Arc<Backend>> = (0..len)
            .map(|i| backends[(offset + i) % len].clone())
            .collect();
        ordered.sort_by_key(|b| b.in_flight());
        ordered
    }
}
