//! Ledger domain types
//!
//! Identifiers, the bounded lunch quantity, student and permission records,
//! and the filter used by the date-scoped query view.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::errors::LedgerError;

/// Identifier of a student in the directory
///
/// The ledger only ever holds this as a weak reference; it never owns the
/// student record it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(i64);

impl StudentId {
    /// Wrap a raw store row id
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw store row id
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudentId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Identifier of a permission record in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(i64);

impl PermissionId {
    /// Wrap a raw store row id
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw store row id
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PermissionId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Number of lunch items a permission authorizes, always within `1..=3`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u8);

impl Quantity {
    /// Smallest quantity a permission may carry
    pub const MIN: Quantity = Quantity(1);
    /// Largest quantity a permission may carry
    pub const MAX: Quantity = Quantity(3);

    /// Validate a requested quantity
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ConstraintViolation`] when `raw` is outside `1..=3`.
    pub fn new(raw: i64) -> Result<Self, LedgerError> {
        match u8::try_from(raw) {
            Ok(value) if (Self::MIN.0..=Self::MAX.0).contains(&value) => Ok(Self(value)),
            _ => Err(LedgerError::constraint_violation(format!(
                "quantity {raw} is outside {}..={}",
                Self::MIN.0,
                Self::MAX.0
            ))),
        }
    }

    /// Get the quantity as a plain integer
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = LedgerError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<Quantity> for i64 {
    fn from(quantity: Quantity) -> Self {
        i64::from(quantity.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Student record owned by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Directory identifier
    pub id: StudentId,
    /// School registration code, unique across the directory
    pub registration_code: String,
    /// Display name
    pub name: String,
    /// Reference to the student's photo (path or URL)
    pub photo_ref: String,
}

/// Fields supplied when creating or replacing a student record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    /// School registration code
    pub registration_code: String,
    /// Display name
    pub name: String,
    /// Reference to the student's photo
    pub photo_ref: String,
}

impl NewStudent {
    /// Build a new student payload
    pub fn new(
        registration_code: impl Into<String>,
        name: impl Into<String>,
        photo_ref: impl Into<String>,
    ) -> Self {
        Self {
            registration_code: registration_code.into(),
            name: name.into(),
            photo_ref: photo_ref.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), LedgerError> {
        if self.registration_code.trim().is_empty() {
            return Err(LedgerError::constraint_violation(
                "registration code must not be blank",
            ));
        }
        if self.name.trim().is_empty() {
            return Err(LedgerError::constraint_violation(
                "student name must not be blank",
            ));
        }
        Ok(())
    }
}

/// Authorization for one student to receive lunch on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Ledger identifier
    pub id: PermissionId,
    /// Student the permission is granted to
    pub student_id: StudentId,
    /// Date the lunch may be released
    pub release_date: NaiveDate,
    /// Number of items authorized
    pub quantity: Quantity,
    /// Whether the lunch has been handed over
    pub delivered: bool,
}

/// A permission joined with the display fields of its student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRow {
    /// The permission itself
    #[serde(flatten)]
    pub permission: Permission,
    /// Student display name
    pub student_name: String,
    /// Student photo reference
    pub student_photo_ref: String,
}

/// Delivery state selector for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Both pending and delivered permissions
    #[default]
    Any,
    /// Only permissions still awaiting delivery
    Pending,
    /// Only permissions already delivered
    Delivered,
}

impl DeliveryState {
    /// Value the `delivered` column must hold, or `None` for no restriction
    pub fn delivered_flag(self) -> Option<bool> {
        match self {
            Self::Any => None,
            Self::Pending => Some(false),
            Self::Delivered => Some(true),
        }
    }
}

/// Filter for [`crate::PermissionLedger::list_permissions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionFilter {
    /// Restrict to one release date
    pub release_date: Option<NaiveDate>,
    /// Restrict by delivery state
    pub state: DeliveryState,
}

impl PermissionFilter {
    /// Every permission in the ledger
    pub fn all() -> Self {
        Self::default()
    }

    /// Every permission for one release date
    pub fn on(release_date: NaiveDate) -> Self {
        Self {
            release_date: Some(release_date),
            state: DeliveryState::Any,
        }
    }

    /// Delivered permissions, optionally for one date
    pub fn delivered(release_date: Option<NaiveDate>) -> Self {
        Self {
            release_date,
            state: DeliveryState::Delivered,
        }
    }

    /// Pending permissions, optionally for one date
    pub fn pending(release_date: Option<NaiveDate>) -> Self {
        Self {
            release_date,
            state: DeliveryState::Pending,
        }
    }
}
