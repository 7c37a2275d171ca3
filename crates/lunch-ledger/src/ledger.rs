//! Permission ledger
//!
//! Owns the `lunch_permissions` relation. Every mutation is a single
//! statement, so the store's uniqueness and check constraints are what
//! enforce one permission per (student, date) and the quantity bound; the
//! quantity is also validated before the statement is issued.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::config::FulfilledRecordPolicy;
use crate::directory::StudentDirectory;
use crate::errors::{permission_write_error, LedgerError};
use crate::store::SqliteStore;
use crate::types::{Permission, PermissionFilter, PermissionId, PermissionRow, Quantity, StudentId};

/// The permission–delivery ledger
///
/// Constructed once at process start and shared by reference; it holds a
/// handle to the store and to the directory used for listing enrichment.
#[derive(Clone)]
pub struct PermissionLedger {
    pub(crate) store: SqliteStore,
    directory: Arc<dyn StudentDirectory>,
    policy: FulfilledRecordPolicy,
}

impl std::fmt::Debug for PermissionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionLedger")
            .field("store", &self.store)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

pub(crate) fn permission_from_row(row: &Row<'_>) -> rusqlite::Result<Permission> {
    Ok(Permission {
        id: row.get("id")?,
        student_id: row.get("student_id")?,
        release_date: row.get("release_date")?,
        quantity: row.get("quantity")?,
        delivered: row.get("delivered")?,
    })
}

/// After a guarded write matched nothing, tell a locked record apart from a missing one.
fn ensure_not_locked(conn: &Connection, id: PermissionId) -> Result<(), LedgerError> {
    let delivered: Option<bool> = conn
        .query_row(
            "SELECT delivered FROM lunch_permissions WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    match delivered {
        Some(true) => Err(LedgerError::FulfilledRecordLocked { permission_id: id }),
        _ => Ok(()),
    }
}

impl PermissionLedger {
    /// Create a ledger over a store and a student directory
    pub fn new(
        store: SqliteStore,
        directory: Arc<dyn StudentDirectory>,
        policy: FulfilledRecordPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            policy,
        }
    }

    /// Policy applied to delivered permissions
    pub fn policy(&self) -> FulfilledRecordPolicy {
        self.policy
    }

    /// Grant a student lunch on a date
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ConstraintViolation`] if `quantity` is outside `1..=3`
    /// - [`LedgerError::DuplicateKey`] if the student already has a permission that day
    /// - [`LedgerError::UnknownStudent`] if the student is not in the directory
    pub async fn create_permission(
        &self,
        student_id: StudentId,
        release_date: NaiveDate,
        quantity: i64,
    ) -> Result<PermissionId, LedgerError> {
        let quantity = Quantity::new(quantity)?;
        tracing::debug!(%student_id, %release_date, %quantity, "creating lunch permission");

        let id = self
            .store
            .run("create_permission", move |conn| {
                conn.execute(
                    "INSERT INTO lunch_permissions (student_id, release_date, quantity)
                     VALUES (?1, ?2, ?3)",
                    params![student_id, release_date, quantity],
                )
                .map_err(|e| permission_write_error(e, student_id, release_date))?;
                Ok(PermissionId::new(conn.last_insert_rowid()))
            })
            .await?;

        tracing::info!(permission_id = %id, %student_id, %release_date, "lunch permission created");
        Ok(id)
    }

    /// Overwrite the student, date and quantity of a permission
    ///
    /// Returns the number of rows changed; 0 when the id does not exist.
    /// The delivery flag is never touched.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ConstraintViolation`] if `quantity` is outside `1..=3`
    /// - [`LedgerError::DuplicateKey`] if another permission owns the new (student, date)
    /// - [`LedgerError::FulfilledRecordLocked`] if delivered records are locked
    pub async fn update_permission(
        &self,
        id: PermissionId,
        student_id: StudentId,
        release_date: NaiveDate,
        quantity: i64,
    ) -> Result<usize, LedgerError> {
        let quantity = Quantity::new(quantity)?;
        let policy = self.policy;
        tracing::debug!(permission_id = %id, %student_id, %release_date, %quantity, "updating lunch permission");

        let changed = self
            .store
            .run("update_permission", move |conn| {
                let sql = match policy {
                    FulfilledRecordPolicy::Locked => {
                        "UPDATE lunch_permissions SET student_id = ?1, release_date = ?2, quantity = ?3
                         WHERE id = ?4 AND delivered = 0"
                    }
                    FulfilledRecordPolicy::Mutable => {
                        "UPDATE lunch_permissions SET student_id = ?1, release_date = ?2, quantity = ?3
                         WHERE id = ?4"
                    }
                };
                let changed = conn
                    .execute(sql, params![student_id, release_date, quantity, id])
                    .map_err(|e| permission_write_error(e, student_id, release_date))?;
                if changed == 0 && policy == FulfilledRecordPolicy::Locked {
                    ensure_not_locked(conn, id)?;
                }
                Ok(changed)
            })
            .await?;

        tracing::info!(permission_id = %id, changed, "lunch permission updated");
        Ok(changed)
    }

    /// Remove a permission, returning the number of rows changed
    ///
    /// A missing id is not an error; it changes 0 rows.
    ///
    /// # Errors
    ///
    /// [`LedgerError::FulfilledRecordLocked`] if delivered records are locked.
    pub async fn delete_permission(&self, id: PermissionId) -> Result<usize, LedgerError> {
        let policy = self.policy;
        let changed = self
            .store
            .run("delete_permission", move |conn| {
                let sql = match policy {
                    FulfilledRecordPolicy::Locked => {
                        "DELETE FROM lunch_permissions WHERE id = ?1 AND delivered = 0"
                    }
                    FulfilledRecordPolicy::Mutable => "DELETE FROM lunch_permissions WHERE id = ?1",
                };
                let changed = conn.execute(sql, params![id])?;
                if changed == 0 && policy == FulfilledRecordPolicy::Locked {
                    ensure_not_locked(conn, id)?;
                }
                Ok(changed)
            })
            .await?;

        tracing::info!(permission_id = %id, changed, "lunch permission deleted");
        Ok(changed)
    }

    /// Fetch one permission without enrichment
    ///
    /// # Errors
    ///
    /// [`LedgerError::StoreUnavailable`] if the store cannot be read.
    pub async fn get_permission(&self, id: PermissionId) -> Result<Option<Permission>, LedgerError> {
        self.store
            .run("get_permission", move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, student_id, release_date, quantity, delivered
                         FROM lunch_permissions WHERE id = ?1",
                        params![id],
                        permission_from_row,
                    )
                    .optional()?)
            })
            .await
    }

    /// List permissions joined with student display fields
    ///
    /// Rows are ordered by release date, then student, then permission id.
    /// Permissions whose student cannot be resolved are left out.
    ///
    /// Display fields come from one directory lookup per distinct student,
    /// each its own store round trip, so a listing is not a single snapshot:
    /// a student renamed mid-listing may show either name.
    ///
    /// # Errors
    ///
    /// [`LedgerError::StoreUnavailable`] if the store cannot be read.
    pub async fn list_permissions(
        &self,
        filter: PermissionFilter,
    ) -> Result<Vec<PermissionRow>, LedgerError> {
        tracing::debug!(?filter, "listing lunch permissions");
        let delivered = filter.state.delivered_flag();
        let release_date = filter.release_date;

        let permissions = self
            .store
            .run("list_permissions", move |conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT id, student_id, release_date, quantity, delivered
                     FROM lunch_permissions
                     WHERE (?1 IS NULL OR release_date = ?1)
                       AND (?2 IS NULL OR delivered = ?2)
                     ORDER BY release_date, student_id, id",
                )?;
                let permissions = stmt
                    .query_map(params![release_date, delivered], permission_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(permissions)
            })
            .await?;

        self.enrich(permissions).await
    }

    async fn enrich(&self, permissions: Vec<Permission>) -> Result<Vec<PermissionRow>, LedgerError> {
        let student_ids: BTreeSet<StudentId> =
            permissions.iter().map(|p| p.student_id).collect();
        let mut students = HashMap::with_capacity(student_ids.len());
        for student_id in student_ids {
            if let Some(student) = self.directory.get_student(student_id).await? {
                students.insert(student_id, student);
            }
        }

        Ok(permissions
            .into_iter()
            .filter_map(|permission| match students.get(&permission.student_id) {
                Some(student) => Some(PermissionRow {
                    student_name: student.name.clone(),
                    student_photo_ref: student.photo_ref.clone(),
                    permission,
                }),
                None => {
                    tracing::warn!(
                        permission_id = %permission.id,
                        student_id = %permission.student_id,
                        "dropping permission whose student is not in the directory"
                    );
                    None
                }
            })
            .collect())
    }
}
