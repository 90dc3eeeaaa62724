use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Per-endpoint operation counters reported by `/api/health`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct OperationCounts {
    pub verifications: u64,
    pub work_proofs: u64,
    pub timestamps: u64,
    pub anchors_generated: u64,
    pub rate_limited: u64,
}

/// Operations registry
#[derive(Clone)]
pub struct OpsCollector {
    counts: Arc<RwLock<OperationCounts>>,
    start_time: Instant,
}

impl OpsCollector {
    pub fn new() -> Self {
        Self {
            counts: Arc::new(RwLock::new(OperationCounts::default())),
            start_time: Instant::now(),
        }
    }

    pub fn record_verification(&self) {
        self.counts.write().verifications += 1;
    }

    pub fn record_work_proof(&self) {
        self.counts.write().work_proofs += 1;
    }

    pub fn record_timestamp(&self) {
        self.counts.write().timestamps += 1;
    }

    pub fn record_anchor_generated(&self) {
        self.counts.write().anchors_generated += 1;
    }

    pub fn record_rate_limited(&self) {
        self.counts.write().rate_limited += 1;
    }

    pub fn snapshot(&self) -> OperationCounts {
        self.counts.read().clone()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for OpsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let ops = OpsCollector::new();
        ops.record_verification();
        ops.record_verification();
        ops.record_timestamp();

        let snapshot = ops.snapshot();
        assert_eq!(snapshot.verifications, 2);
        assert_eq!(snapshot.timestamps, 1);
        assert_eq!(snapshot.work_proofs, 0);
    }

    #[test]
    fn test_collector_is_cloneable_and_shared() {
        let ops = OpsCollector::new();
        let clone = ops.clone();
        clone.record_work_proof();
        assert_eq!(ops.snapshot().work_proofs, 1, "clones share the same counters");
    }
}
