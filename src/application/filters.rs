//! Typed listing filters, validated once at construction.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::Deserialize;

use crate::domain::entities::SpecializationRecord;
use crate::domain::error::DomainError;
use crate::domain::scoring::ScoredSpecialization;
use crate::domain::types::PriorityTier;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 50;
pub const MAX_PER_PAGE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    #[default]
    AssignmentScore,
    UtilizationRate,
    ExpertiseRating,
    CurrentWorkload,
    Id,
}

impl FromStr for SortKey {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "assignment_score" | "score" => Ok(SortKey::AssignmentScore),
            "utilization_rate" | "utilization" => Ok(SortKey::UtilizationRate),
            "expertise_rating" => Ok(SortKey::ExpertiseRating),
            "current_workload" => Ok(SortKey::CurrentWorkload),
            "id" => Ok(SortKey::Id),
            other => Err(DomainError::validation(
                "sort_by",
                format!("unsupported sort key `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(DomainError::validation(
                "sort_order",
                format!("expected `asc` or `desc`, got `{other}`"),
            )),
        }
    }
}

/// Raw, untrusted filter input as it arrives from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub category_id: Option<i64>,
    pub counselor_id: Option<i64>,
    pub available: Option<bool>,
    pub priority_tier: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Every recognized specialization filter key with its default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecializationFilter {
    pub category_id: Option<i64>,
    pub counselor_id: Option<i64>,
    pub available: Option<bool>,
    pub priority_tier: Option<PriorityTier>,
    pub sort: SortKey,
    pub direction: SortDirection,
    pub page: u32,
    pub per_page: u32,
}

impl Default for SpecializationFilter {
    fn default() -> Self {
        Self {
            category_id: None,
            counselor_id: None,
            available: None,
            priority_tier: None,
            sort: SortKey::default(),
            direction: SortDirection::default(),
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl TryFrom<FilterParams> for SpecializationFilter {
    type Error = DomainError;

    fn try_from(params: FilterParams) -> Result<Self, Self::Error> {
        Self::from_params(params)
    }
}

impl SpecializationFilter {
    pub fn from_params(params: FilterParams) -> Result<Self, DomainError> {
        let FilterParams {
            category_id,
            counselor_id,
            available,
            priority_tier,
            sort_by,
            sort_order,
            page,
            per_page,
        } = params;

        if let Some(id) = category_id {
            ensure_positive_id("category_id", id)?;
        }
        if let Some(id) = counselor_id {
            ensure_positive_id("counselor_id", id)?;
        }

        let priority_tier = priority_tier
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(PriorityTier::from_str)
            .transpose()?;
        let sort = sort_by
            .as_deref()
            .map(SortKey::from_str)
            .transpose()?
            .unwrap_or_default();
        let direction = sort_order
            .as_deref()
            .map(SortDirection::from_str)
            .transpose()?
            .unwrap_or_default();

        let page = page.unwrap_or(DEFAULT_PAGE);
        if page == 0 {
            return Err(DomainError::validation("page", "pages start at 1"));
        }
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(DomainError::validation(
                "per_page",
                format!("must be between 1 and {MAX_PER_PAGE}"),
            ));
        }

        Ok(Self {
            category_id,
            counselor_id,
            available,
            priority_tier,
            sort,
            direction,
            page,
            per_page,
        })
    }

    pub fn for_category(category_id: i64) -> Self {
        Self {
            category_id: Some(category_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &SpecializationRecord) -> bool {
        self.category_id.is_none_or(|id| record.category_id == id)
            && self.counselor_id.is_none_or(|id| record.counselor_id == id)
            && self.available.is_none_or(|flag| record.is_available == flag)
            && self
                .priority_tier
                .is_none_or(|tier| record.priority_tier == tier)
    }

    /// Order two scored records by the configured key; ties fall back to id.
    pub fn compare(&self, a: &ScoredSpecialization, b: &ScoredSpecialization) -> Ordering {
        let primary = match self.sort {
            SortKey::AssignmentScore => a.assignment_score.cmp(&b.assignment_score),
            SortKey::UtilizationRate => a.utilization_rate.cmp(&b.utilization_rate),
            SortKey::ExpertiseRating => a.record.expertise_rating.cmp(&b.record.expertise_rating),
            SortKey::CurrentWorkload => a.record.current_workload.cmp(&b.record.current_workload),
            SortKey::Id => Ordering::Equal,
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.record.id.cmp(&b.record.id))
    }

    /// Zero-based offset of the first record on the requested page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize)
    }
}

fn ensure_positive_id(field: &'static str, id: i64) -> Result<(), DomainError> {
    if id <= 0 {
        return Err(DomainError::validation(field, "ids must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_params_yield_defaults() {
        let filter = SpecializationFilter::from_params(FilterParams::default()).expect("filter");
        assert_eq!(filter, SpecializationFilter::default());
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn parses_every_recognized_key() {
        let params = FilterParams {
            category_id: Some(3),
            counselor_id: Some(9),
            available: Some(true),
            priority_tier: Some("backup".into()),
            sort_by: Some("utilization_rate".into()),
            sort_order: Some("ASC".into()),
            page: Some(3),
            per_page: Some(20),
        };
        let filter = SpecializationFilter::from_params(params).expect("filter");
        assert_eq!(filter.category_id, Some(3));
        assert_eq!(filter.priority_tier, Some(PriorityTier::Backup));
        assert_eq!(filter.sort, SortKey::UtilizationRate);
        assert_eq!(filter.direction, SortDirection::Asc);
        assert_eq!(filter.offset(), 40);
    }

    #[test]
    fn rejects_invalid_input_at_construction() {
        let cases = [
            FilterParams {
                category_id: Some(0),
                ..Default::default()
            },
            FilterParams {
                per_page: Some(MAX_PER_PAGE + 1),
                ..Default::default()
            },
            FilterParams {
                page: Some(0),
                ..Default::default()
            },
            FilterParams {
                sort_by: Some("mood".into()),
                ..Default::default()
            },
            FilterParams {
                priority_tier: Some("tertiary".into()),
                ..Default::default()
            },
        ];
        for params in cases {
            assert!(matches!(
                SpecializationFilter::from_params(params),
                Err(DomainError::Validation { .. })
            ));
        }
    }
}
