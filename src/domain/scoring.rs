//! Assignment scoring.
//!
//! Every value here is a pure function of a [`SpecializationRecord`]'s stored
//! inputs. Nothing is memoized on the record, so a changed `is_available` or
//! `current_workload` is reflected by the very next read.

use serde::Serialize;

use crate::domain::entities::{
    DEFAULT_EXPERTISE_RATING, MAX_EXPERTISE_RATING, MIN_EXPERTISE_RATING, SpecializationRecord,
};
use crate::domain::types::PriorityTier;

/// Weight applied to tiers this build does not recognize.
const FALLBACK_PRIORITY_WEIGHT: f64 = 0.5;

/// Percentage of capacity occupied, rounded to the nearest integer.
///
/// A record with `max_workload == 0` reports 0. The same record can never take
/// a ticket (`current_workload < 0` is impossible), so it also scores 0; the
/// zero here is a definition, not a masked division error.
pub fn utilization_rate(record: &SpecializationRecord) -> u32 {
    if record.max_workload == 0 {
        return 0;
    }
    let ratio = f64::from(record.current_workload) / f64::from(record.max_workload);
    (ratio * 100.0).round() as u32
}

/// Overload (`current_workload > max_workload`) is valid state and simply yields `false`.
pub fn can_take_ticket(record: &SpecializationRecord) -> bool {
    record.is_available && record.current_workload < record.max_workload
}

pub fn priority_weight(tier: PriorityTier) -> f64 {
    match tier {
        PriorityTier::Primary => 1.0,
        PriorityTier::Secondary => 0.8,
        PriorityTier::Backup => 0.6,
        PriorityTier::Unrecognized => FALLBACK_PRIORITY_WEIGHT,
    }
}

/// Ratings outside 1..=5 are clamped so the score stays within `[0, 100]`.
pub fn expertise_weight(rating: Option<u8>) -> f64 {
    let rating = rating
        .unwrap_or(DEFAULT_EXPERTISE_RATING)
        .clamp(MIN_EXPERTISE_RATING, MAX_EXPERTISE_RATING);
    f64::from(rating) / f64::from(MAX_EXPERTISE_RATING)
}

/// Suitability of a record for the next ticket, in `[0, 100]`.
pub fn assignment_score(record: &SpecializationRecord) -> u8 {
    if !can_take_ticket(record) {
        return 0;
    }
    let utilization = f64::from(utilization_rate(record).min(100));
    let availability_score = (100.0 - utilization) / 100.0;
    let score = availability_score
        * priority_weight(record.priority_tier)
        * expertise_weight(record.expertise_rating)
        * 100.0;
    score.round().clamp(0.0, 100.0) as u8
}

impl SpecializationRecord {
    pub fn utilization_rate(&self) -> u32 {
        utilization_rate(self)
    }

    pub fn can_take_ticket(&self) -> bool {
        can_take_ticket(self)
    }

    pub fn assignment_score(&self) -> u8 {
        assignment_score(self)
    }

    pub fn scored(&self) -> ScoredSpecialization {
        ScoredSpecialization::from(self)
    }
}

/// Read-only view of a record together with its derived fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSpecialization {
    #[serde(flatten)]
    pub record: SpecializationRecord,
    pub utilization_rate: u32,
    pub assignment_score: u8,
    pub can_take_ticket: bool,
}

impl From<&SpecializationRecord> for ScoredSpecialization {
    fn from(record: &SpecializationRecord) -> Self {
        Self {
            utilization_rate: record.utilization_rate(),
            assignment_score: record.assignment_score(),
            can_take_ticket: record.can_take_ticket(),
            record: record.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        tier: PriorityTier,
        rating: Option<u8>,
        max: u32,
        current: u32,
        available: bool,
    ) -> SpecializationRecord {
        SpecializationRecord {
            id: 1,
            counselor_id: 10,
            category_id: 100,
            priority_tier: tier,
            expertise_rating: rating,
            max_workload: max,
            current_workload: current,
            is_available: available,
            counselor_name: None,
            category_name: None,
        }
    }

    #[test]
    fn idle_primary_expert_scores_full_marks() {
        let rec = record(PriorityTier::Primary, Some(5), 10, 0, true);
        assert_eq!(rec.assignment_score(), 100);
        assert_eq!(rec.utilization_rate(), 0);
        assert!(rec.can_take_ticket());
    }

    #[test]
    fn full_capacity_scores_zero() {
        let rec = record(PriorityTier::Primary, Some(5), 10, 10, true);
        assert!(!rec.can_take_ticket());
        assert_eq!(rec.assignment_score(), 0);
        assert_eq!(rec.utilization_rate(), 100);
    }

    #[test]
    fn busy_backup_with_default_rating() {
        let rec = record(PriorityTier::Backup, Some(3), 5, 4, true);
        assert_eq!(rec.utilization_rate(), 80);
        assert_eq!(rec.assignment_score(), 7);
    }

    #[test]
    fn missing_rating_defaults_to_three() {
        let explicit = record(PriorityTier::Secondary, Some(3), 4, 1, true);
        let implicit = record(PriorityTier::Secondary, None, 4, 1, true);
        assert_eq!(explicit.assignment_score(), implicit.assignment_score());
        // 0.75 * 0.8 * 0.6 * 100 = 36
        assert_eq!(implicit.assignment_score(), 36);
    }

    #[test]
    fn zero_capacity_never_divides_and_never_assigns() {
        let rec = record(PriorityTier::Primary, Some(5), 0, 0, true);
        assert_eq!(rec.utilization_rate(), 0);
        assert!(!rec.can_take_ticket());
        assert_eq!(rec.assignment_score(), 0);
    }

    #[test]
    fn unavailable_scores_zero() {
        let rec = record(PriorityTier::Primary, Some(5), 10, 0, false);
        assert_eq!(rec.assignment_score(), 0);
    }

    #[test]
    fn overload_is_not_an_error() {
        let rec = record(PriorityTier::Primary, Some(4), 3, 7, true);
        assert_eq!(rec.utilization_rate(), 233);
        assert!(!rec.can_take_ticket());
        assert_eq!(rec.assignment_score(), 0);
    }

    #[test]
    fn unrecognized_tier_uses_fallback_weight() {
        let rec = record(PriorityTier::Unrecognized, Some(5), 10, 0, true);
        assert_eq!(rec.assignment_score(), 50);
    }

    #[test]
    fn out_of_range_rating_is_clamped() {
        let high = record(PriorityTier::Primary, Some(9), 10, 0, true);
        assert_eq!(high.assignment_score(), 100);
        let low = record(PriorityTier::Primary, Some(0), 10, 0, true);
        assert_eq!(low.assignment_score(), 20);
    }

    #[test]
    fn score_stays_in_bounds_across_inputs() {
        let tiers = [
            PriorityTier::Primary,
            PriorityTier::Secondary,
            PriorityTier::Backup,
            PriorityTier::Unrecognized,
        ];
        for tier in tiers {
            for rating in [None, Some(0), Some(1), Some(3), Some(5), Some(200)] {
                for max in 0..6 {
                    for current in 0..8 {
                        for available in [true, false] {
                            let rec = record(tier, rating, max, current, available);
                            let score = rec.assignment_score();
                            assert!(score <= 100);
                            if !available || current >= max {
                                assert_eq!(score, 0);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn scored_view_serializes_derived_fields_beside_record() {
        let rec = record(PriorityTier::Backup, Some(3), 5, 4, true);
        let json = serde_json::to_value(rec.scored()).expect("serialize");
        assert_eq!(json["id"], 1);
        assert_eq!(json["utilization_rate"], 80);
        assert_eq!(json["assignment_score"], 7);
        assert_eq!(json["can_take_ticket"], true);
    }
}
