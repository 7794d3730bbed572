//! Role checks for mutating operations.
//!
//! Callers are expected to hide controls a role cannot use; these checks run
//! regardless.

use serde::{Deserialize, Serialize};

use crate::application::error::AppError;
use crate::domain::entities::SpecializationRecord;
use crate::domain::types::Role;

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn admin(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn counselor(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Counselor,
        }
    }

    pub fn client(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Client,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self, operation: &str) -> Result<(), AppError> {
        if self.is_admin() {
            return Ok(());
        }
        Err(AppError::permission(format!(
            "{operation} requires admin, caller is {}",
            self.role.as_str()
        )))
    }

    /// Admins and counselors; clients never route tickets.
    pub fn require_staff(&self, operation: &str) -> Result<(), AppError> {
        match self.role {
            Role::Admin | Role::Counselor => Ok(()),
            Role::Client => Err(AppError::permission(format!(
                "{operation} requires staff, caller is client"
            ))),
        }
    }

    /// Admins manage every record; counselors only their own.
    pub fn require_owner_or_admin(
        &self,
        operation: &str,
        record: &SpecializationRecord,
    ) -> Result<(), AppError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Counselor if record.counselor_id == self.user_id => Ok(()),
            _ => Err(AppError::permission(format!(
                "{operation} on specialization `{}` denied for {} `{}`",
                record.id,
                self.role.as_str(),
                self.user_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::ErrorKind;
    use crate::domain::types::PriorityTier;

    fn owned_by(counselor_id: i64) -> SpecializationRecord {
        SpecializationRecord {
            id: 1,
            counselor_id,
            category_id: 1,
            priority_tier: PriorityTier::Primary,
            expertise_rating: None,
            max_workload: 1,
            current_workload: 0,
            is_available: true,
            counselor_name: None,
            category_name: None,
        }
    }

    #[test]
    fn counselor_may_only_touch_own_records() {
        let actor = Actor::counselor(7);
        assert!(actor.require_owner_or_admin("toggle", &owned_by(7)).is_ok());
        let denied = actor
            .require_owner_or_admin("toggle", &owned_by(8))
            .expect_err("foreign record");
        assert_eq!(denied.kind(), ErrorKind::Permission);
    }

    #[test]
    fn clients_are_not_staff() {
        assert!(Actor::client(1).require_staff("bulk_assign").is_err());
        assert!(Actor::counselor(1).require_staff("bulk_assign").is_ok());
        assert!(Actor::counselor(1).require_admin("reset").is_err());
        assert!(Actor::admin(1).require_admin("reset").is_ok());
    }
}
