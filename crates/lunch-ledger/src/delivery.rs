//! Delivery confirmation
//!
//! `delivered` only ever moves from false to true, and only through
//! [`PermissionLedger::confirm_delivery`]. The check and the set are one
//! conditional `UPDATE`, so concurrent confirmations of the same permission
//! produce exactly one success.

use chrono::NaiveDate;
use rusqlite::params;

use crate::errors::LedgerError;
use crate::ledger::PermissionLedger;
use crate::types::{PermissionFilter, PermissionId, PermissionRow};

impl PermissionLedger {
    /// Mark a pending permission as delivered
    ///
    /// # Errors
    ///
    /// [`LedgerError::AlreadyDeliveredOrNotFound`] when no pending permission
    /// with this id exists. The two cases are deliberately not distinguished;
    /// use [`PermissionLedger::get_permission`] first if the difference matters.
    pub async fn confirm_delivery(&self, permission_id: PermissionId) -> Result<(), LedgerError> {
        let changed = self
            .store
            .run("confirm_delivery", move |conn| {
                Ok(conn.execute(
                    "UPDATE lunch_permissions SET delivered = 1 WHERE id = ?1 AND delivered = 0",
                    params![permission_id],
                )?)
            })
            .await?;

        if changed == 0 {
            tracing::warn!(%permission_id, "delivery rejected: already delivered or not found");
            return Err(LedgerError::AlreadyDeliveredOrNotFound { permission_id });
        }

        tracing::info!(%permission_id, "lunch delivered");
        Ok(())
    }

    /// Delivered permissions, optionally restricted to one date
    ///
    /// # Errors
    ///
    /// [`LedgerError::StoreUnavailable`] if the store cannot be read.
    pub async fn list_deliveries(
        &self,
        release_date: Option<NaiveDate>,
    ) -> Result<Vec<PermissionRow>, LedgerError> {
        self.list_permissions(PermissionFilter::delivered(release_date))
            .await
    }

    /// Permissions still awaiting delivery, optionally restricted to one date
    ///
    /// # Errors
    ///
    /// [`LedgerError::StoreUnavailable`] if the store cannot be read.
    pub async fn list_pending(
        &self,
        release_date: Option<NaiveDate>,
    ) -> Result<Vec<PermissionRow>, LedgerError> {
        self.list_permissions(PermissionFilter::pending(release_date))
            .await
    }
}
