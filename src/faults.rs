//! # Active fault-injection tracking.
//!
//! [`FaultTracker`] mirrors the daemon's reported fault-injection set. The
//! set is replaced wholesale on every `FInjects` frame and is never mutated
//! optimistically: `inject_fault` waits for the daemon's confirmation to
//! show up here instead of assuming the request took effect.

use std::collections::HashSet;

use tokio::sync::RwLock;

/// Set of fault identifiers the daemon has confirmed active.
#[derive(Default)]
pub struct FaultTracker {
    active: RwLock<HashSet<String>>,
}

impl FaultTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set with the daemon's latest report.
    pub async fn replace(&self, faults: Vec<String>) {
        let mut active = self.active.write().await;
        *active = faults.into_iter().collect();
    }

    /// Whether `fault` is currently confirmed active.
    pub async fn contains(&self, fault: &str) -> bool {
        self.active.read().await.contains(fault)
    }

    /// Whether `fault`'s presence matches `enabled` — the acknowledgement
    /// predicate for `inject_fault`.
    pub async fn matches(&self, fault: &str, enabled: bool) -> bool {
        self.contains(fault).await == enabled
    }

    /// Sorted snapshot of the active set.
    pub async fn snapshot(&self) -> Vec<String> {
        let mut faults: Vec<String> = self.active.read().await.iter().cloned().collect();
        faults.sort_unstable();
        faults
    }

    /// Clears the set; used on reset.
    pub async fn clear(&self) {
        self.active.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_is_wholesale() {
        let tracker = FaultTracker::new();
        tracker.replace(vec!["a".into(), "b".into()]).await;
        assert!(tracker.contains("a").await);
        tracker.replace(vec!["c".into()]).await;
        assert!(!tracker.contains("a").await);
        assert!(tracker.contains("c").await);
    }

    #[tokio::test]
    async fn matches_tracks_enablement() {
        let tracker = FaultTracker::new();
        assert!(tracker.matches("slow-disk", false).await);
        assert!(!tracker.matches("slow-disk", true).await);
        tracker.replace(vec!["slow-disk".into()]).await;
        assert!(tracker.matches("slow-disk", true).await);
    }

    #[tokio::test]
    async fn snapshot_is_sorted() {
        let tracker = FaultTracker::new();
        tracker.replace(vec!["z".into(), "a".into(), "m".into()]).await;
        assert_eq!(tracker.snapshot().await, vec!["a", "m", "z"]);
    }
}
