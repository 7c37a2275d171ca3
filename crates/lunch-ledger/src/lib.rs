//! # Lunch Ledger
//!
//! Tracks which students may collect lunch on a given date, how many items
//! they may take, and whether the lunch has been handed over.
//!
//! ## Core Concepts
//!
//! - **Permission**: one student, one date, a quantity in `1..=3`. At most one
//!   permission exists per (student, date).
//! - **Delivery confirmation**: the one-way `delivered: false -> true`
//!   transition, accepted exactly once per permission.
//! - **Directory**: owns student identity; the ledger only holds student ids
//!   and reads display fields through [`StudentDirectory`].
//!
//! ## Usage
//!
//! ```no_run
//! # async fn demo() -> Result<(), lunch_ledger::LedgerError> {
//! use std::sync::Arc;
//! use lunch_ledger::{
//!     LedgerConfig, NewStudent, PermissionFilter, PermissionLedger, SqliteStore,
//!     SqliteStudentDirectory,
//! };
//!
//! let config = LedgerConfig::default();
//! let store = SqliteStore::from_config(&config)?;
//! let directory = Arc::new(SqliteStudentDirectory::new(store.clone()));
//! let ledger = PermissionLedger::new(store, directory.clone(), config.fulfilled_records);
//!
//! let student = directory
//!     .create_student(NewStudent::new("RA-001", "Ana", "photos/ana.jpg"))
//!     .await?;
//! let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default();
//! let permission = ledger.create_permission(student, date, 2).await?;
//! ledger.confirm_delivery(permission).await?;
//! let delivered = ledger.list_permissions(PermissionFilter::delivered(Some(date))).await?;
//! # let _ = delivered;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

/// Ledger configuration and the fulfilled-record policy
pub mod config;

/// Delivery confirmation and delivery views
pub mod delivery;

/// Student directory contract and its SQLite implementation
pub mod directory;

/// Error taxonomy
pub mod errors;

/// Permission CRUD and the date-scoped query view
pub mod ledger;

/// SQLite store handle
pub mod store;

/// Identifiers, records and filters
pub mod types;

pub use config::{ConfigError, FulfilledRecordPolicy, LedgerConfig};
pub use directory::{SqliteStudentDirectory, StudentDirectory};
pub use errors::LedgerError;
pub use ledger::PermissionLedger;
pub use store::SqliteStore;
pub use types::{
    DeliveryState, NewStudent, Permission, PermissionFilter, PermissionId, PermissionRow,
    Quantity, Student, StudentId,
};
