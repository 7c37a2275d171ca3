//! Ledger error taxonomy
//!
//! Every ledger and directory operation returns [`LedgerError`]. Failures are
//! surfaced to the caller as-is; nothing in this crate retries.

use chrono::NaiveDate;
use rusqlite::ffi;

use crate::types::{PermissionId, StudentId};

/// Error type for ledger and directory operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A value is outside the bounds the ledger accepts
    #[error("Constraint violation: {reason}")]
    ConstraintViolation {
        /// What was violated
        reason: String,
    },

    /// A permission already exists for this student and date
    #[error("Permission already exists for student {student_id} on {release_date}")]
    DuplicateKey {
        /// Student half of the conflicting key
        student_id: StudentId,
        /// Date half of the conflicting key
        release_date: NaiveDate,
    },

    /// The conditional delivery update matched no pending permission
    #[error("Lunch already delivered or not found: permission {permission_id}")]
    AlreadyDeliveredOrNotFound {
        /// Permission the confirmation targeted
        permission_id: PermissionId,
    },

    /// The backing store could not complete the round trip
    #[error("Store unavailable: {reason}")]
    StoreUnavailable {
        /// Underlying cause
        reason: String,
    },

    /// The permission is delivered and fulfilled records are locked
    #[error("Permission {permission_id} is delivered and can no longer change")]
    FulfilledRecordLocked {
        /// Permission that was targeted
        permission_id: PermissionId,
    },

    /// The referenced student does not exist in the directory
    #[error("Unknown student: {student_id}")]
    UnknownStudent {
        /// Missing student
        student_id: StudentId,
    },

    /// The student is still referenced by permissions
    #[error("Student {student_id} is referenced by lunch permissions")]
    StudentReferenced {
        /// Student that could not be removed
        student_id: StudentId,
    },

    /// Another student already holds this registration code
    #[error("Registration code already in use: {registration_code}")]
    DuplicateRegistrationCode {
        /// Conflicting code
        registration_code: String,
    },
}

impl LedgerError {
    /// Create a constraint violation error
    pub fn constraint_violation(reason: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            reason: reason.into(),
        }
    }

    /// Create a store unavailable error
    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

/// Anything the store reports that is not a recognised constraint is treated
/// as the store being unavailable.
impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::store_unavailable(err.to_string())
    }
}

/// Constraint family reported by SQLite for a failed write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    Unique,
    Check,
    ForeignKey,
    /// `ON DELETE RESTRICT` reports through the trigger code, not the foreign key one.
    Trigger,
    Other,
}

/// Classify a SQLite error by its extended result code
pub(crate) fn constraint_kind(err: &rusqlite::Error) -> Option<ConstraintKind> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    ConstraintKind::Unique
                }
                ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
                ffi::SQLITE_CONSTRAINT_TRIGGER => ConstraintKind::Trigger,
                _ => ConstraintKind::Other,
            })
        }
        _ => None,
    }
}

/// Map a failed permission write to the ledger taxonomy
pub(crate) fn permission_write_error(
    err: rusqlite::Error,
    student_id: StudentId,
    release_date: NaiveDate,
) -> LedgerError {
    match constraint_kind(&err) {
        Some(ConstraintKind::Unique) => LedgerError::DuplicateKey {
            student_id,
            release_date,
        },
        Some(ConstraintKind::ForeignKey) => LedgerError::UnknownStudent { student_id },
        Some(ConstraintKind::Check) => LedgerError::constraint_violation(err.to_string()),
        Some(ConstraintKind::Trigger | ConstraintKind::Other) | None => err.into(),
    }
}

/// Map a failed student write to the ledger taxonomy
pub(crate) fn student_write_error(
    err: rusqlite::Error,
    student_id: Option<StudentId>,
    registration_code: &str,
) -> LedgerError {
    match (constraint_kind(&err), student_id) {
        (Some(ConstraintKind::Unique), _) => LedgerError::DuplicateRegistrationCode {
            registration_code: registration_code.to_string(),
        },
        (Some(ConstraintKind::ForeignKey | ConstraintKind::Trigger), Some(student_id)) => {
            LedgerError::StudentReferenced { student_id }
        }
        (Some(ConstraintKind::Check), _) => LedgerError::constraint_violation(err.to_string()),
        _ => err.into(),
    }
}
