//! Whitelist-based status transition validation.
//!
//! One validator serves every reviewable entity in the crate: each status
//! enum declares its successor table and the entity name used in errors.
//! A self-transition is always accepted, even from a terminal state, so
//! re-saving a record with an unchanged status stays idempotent.

use std::fmt;

use crate::errors::{LendingError, Result};
use crate::types::{AdjustmentStatus, CreditLineStatus, LoanTermStatus, SublineStatus};

/// a status enum governed by a whitelist transition table
pub trait LifecycleStatus: Copy + Eq + fmt::Display + 'static {
    /// entity name reported in transition errors
    const ENTITY: &'static str;

    /// states reachable from this one, the idempotent self-move excluded
    fn successors(self) -> &'static [Self];

    /// a state with no successors admits no further review
    fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }
}

/// validate a requested status change against the entity's table
///
/// Returns the requested status when the move is legal. The self-transition
/// bypasses the table entirely, terminal states included.
pub fn validate_transition<S: LifecycleStatus>(current: S, requested: S) -> Result<S> {
    if requested == current {
        return Ok(requested);
    }
    if current.successors().contains(&requested) {
        Ok(requested)
    } else {
        Err(LendingError::InvalidTransition {
            entity: S::ENTITY,
            current: current.to_string(),
            requested: requested.to_string(),
        })
    }
}

impl LifecycleStatus for AdjustmentStatus {
    const ENTITY: &'static str = "adjustment";

    fn successors(self) -> &'static [Self] {
        match self {
            AdjustmentStatus::PendingReview => {
                &[AdjustmentStatus::Approved, AdjustmentStatus::Rejected]
            }
            AdjustmentStatus::Approved => &[AdjustmentStatus::Implemented],
            AdjustmentStatus::Rejected => &[],
            AdjustmentStatus::Implemented => &[],
        }
    }
}

impl LifecycleStatus for LoanTermStatus {
    const ENTITY: &'static str = "loan term";

    fn successors(self) -> &'static [Self] {
        match self {
            LoanTermStatus::Pending => &[LoanTermStatus::Approved, LoanTermStatus::Rejected],
            LoanTermStatus::Approved => &[],
            LoanTermStatus::Rejected => &[],
        }
    }
}

impl LifecycleStatus for SublineStatus {
    const ENTITY: &'static str = "credit sub-line";

    fn successors(self) -> &'static [Self] {
        match self {
            SublineStatus::Pending => &[SublineStatus::Active, SublineStatus::Inactive],
            SublineStatus::Active => &[],
            SublineStatus::Inactive => &[],
        }
    }
}

impl LifecycleStatus for CreditLineStatus {
    const ENTITY: &'static str = "credit line";

    fn successors(self) -> &'static [Self] {
        match self {
            CreditLineStatus::Pending => {
                &[CreditLineStatus::Approved, CreditLineStatus::Rejected]
            }
            CreditLineStatus::Approved => &[],
            CreditLineStatus::Rejected => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_review_fans_out() {
        assert!(validate_transition(
            AdjustmentStatus::PendingReview,
            AdjustmentStatus::Approved
        )
        .is_ok());
        assert!(validate_transition(
            AdjustmentStatus::PendingReview,
            AdjustmentStatus::Rejected
        )
        .is_ok());
        // skipping review is not allowed
        assert!(validate_transition(
            AdjustmentStatus::PendingReview,
            AdjustmentStatus::Implemented
        )
        .is_err());
    }

    #[test]
    fn test_approved_only_implements() {
        assert!(
            validate_transition(AdjustmentStatus::Approved, AdjustmentStatus::Implemented).is_ok()
        );
        let err = validate_transition(AdjustmentStatus::Approved, AdjustmentStatus::PendingReview)
            .unwrap_err();
        assert!(matches!(err, LendingError::InvalidTransition { .. }));
    }

    #[test]
    fn test_self_transition_allowed_from_every_state() {
        for status in [
            AdjustmentStatus::PendingReview,
            AdjustmentStatus::Approved,
            AdjustmentStatus::Rejected,
            AdjustmentStatus::Implemented,
        ] {
            assert_eq!(validate_transition(status, status).unwrap(), status);
        }
        for status in [
            LoanTermStatus::Pending,
            LoanTermStatus::Approved,
            LoanTermStatus::Rejected,
        ] {
            assert_eq!(validate_transition(status, status).unwrap(), status);
        }
    }

    #[test]
    fn test_terminal_states_reject_everything_else() {
        assert!(
            validate_transition(AdjustmentStatus::Rejected, AdjustmentStatus::Approved).is_err()
        );
        assert!(validate_transition(
            AdjustmentStatus::Implemented,
            AdjustmentStatus::PendingReview
        )
        .is_err());
        assert!(validate_transition(LoanTermStatus::Approved, LoanTermStatus::Pending).is_err());
        assert!(validate_transition(LoanTermStatus::Rejected, LoanTermStatus::Approved).is_err());
        assert!(AdjustmentStatus::Implemented.is_terminal());
        assert!(!AdjustmentStatus::Approved.is_terminal());
    }

    #[test]
    fn test_subline_status_table() {
        assert!(validate_transition(SublineStatus::Pending, SublineStatus::Active).is_ok());
        assert!(validate_transition(SublineStatus::Pending, SublineStatus::Inactive).is_ok());
        assert!(validate_transition(SublineStatus::Active, SublineStatus::Inactive).is_err());
        assert!(validate_transition(SublineStatus::Inactive, SublineStatus::Active).is_err());
    }

    #[test]
    fn test_transition_error_reports_entity_and_endpoints() {
        let err =
            validate_transition(LoanTermStatus::Approved, LoanTermStatus::Pending).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("loan term"));
        assert!(message.contains("approved"));
        assert!(message.contains("pending"));
    }
}
