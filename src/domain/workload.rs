//! Workload aggregation across specialization records.

use serde::{Deserialize, Serialize};

use crate::domain::entities::SpecializationRecord;

/// Utilization at or above this percentage counts as overloaded.
const OVERLOAD_THRESHOLD: u32 = 100;

/// Aggregate view of a set of records. Always recomputed from the full list.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkloadSnapshot {
    pub total_capacity: u64,
    pub total_current_load: u64,
    pub record_count: usize,
    /// Mean utilization rate, rounded to one decimal place.
    pub average_utilization: f64,
    pub overloaded_count: usize,
    pub assignable_count: usize,
}

impl WorkloadSnapshot {
    /// Remaining headroom; overloaded records contribute nothing negative.
    pub fn open_capacity(&self) -> u64 {
        self.total_capacity.saturating_sub(self.total_current_load)
    }
}

/// Deterministic: folds the records in order, so an unchanged slice always
/// yields a bit-identical snapshot.
pub fn aggregate(records: &[SpecializationRecord]) -> WorkloadSnapshot {
    let mut snapshot = WorkloadSnapshot {
        record_count: records.len(),
        ..WorkloadSnapshot::default()
    };
    let mut utilization_sum: u64 = 0;

    for record in records {
        let utilization = record.utilization_rate();
        snapshot.total_capacity += u64::from(record.max_workload);
        snapshot.total_current_load += u64::from(record.current_workload);
        utilization_sum += u64::from(utilization);
        if utilization >= OVERLOAD_THRESHOLD {
            snapshot.overloaded_count += 1;
        }
        if record.can_take_ticket() {
            snapshot.assignable_count += 1;
        }
    }

    if !records.is_empty() {
        let mean = utilization_sum as f64 / records.len() as f64;
        snapshot.average_utilization = (mean * 10.0).round() / 10.0;
    }

    snapshot
}
