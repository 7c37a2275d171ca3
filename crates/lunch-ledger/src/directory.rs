//! Student directory
//!
//! The ledger only reads from the directory, through [`StudentDirectory`], to
//! enrich permission listings with display fields. [`SqliteStudentDirectory`]
//! is the directory living in the same store as the ledger; it also carries
//! the plain CRUD used by operators.
//!
//! Students referenced by permissions cannot be deleted: the store rejects
//! the delete and the caller gets [`LedgerError::StudentReferenced`].

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::errors::{student_write_error, LedgerError};
use crate::store::SqliteStore;
use crate::types::{NewStudent, Student, StudentId};

/// Read contract the ledger relies on for join enrichment
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    /// Look up one student, `None` if the id is unknown
    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, LedgerError>;
}

/// Student directory stored alongside the ledger
#[derive(Debug, Clone)]
pub struct SqliteStudentDirectory {
    store: SqliteStore,
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get("id")?,
        registration_code: row.get("registration_code")?,
        name: row.get("name")?,
        photo_ref: row.get("photo_ref")?,
    })
}

impl SqliteStudentDirectory {
    /// Create a directory over a shared store handle
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    /// Register a student
    ///
    /// # Errors
    ///
    /// [`LedgerError::ConstraintViolation`] for blank fields,
    /// [`LedgerError::DuplicateRegistrationCode`] if the code is taken.
    pub async fn create_student(&self, student: NewStudent) -> Result<StudentId, LedgerError> {
        student.validate()?;
        let id = self
            .store
            .run("create_student", move |conn| {
                conn.execute(
                    "INSERT INTO students (registration_code, name, photo_ref) VALUES (?1, ?2, ?3)",
                    params![student.registration_code, student.name, student.photo_ref],
                )
                .map_err(|e| student_write_error(e, None, &student.registration_code))?;
                Ok(StudentId::new(conn.last_insert_rowid()))
            })
            .await?;
        tracing::info!(student_id = %id, "student registered");
        Ok(id)
    }

    /// All students, ordered by id
    ///
    /// # Errors
    ///
    /// [`LedgerError::StoreUnavailable`] if the store cannot be read.
    pub async fn list_students(&self) -> Result<Vec<Student>, LedgerError> {
        self.store
            .run("list_students", |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, registration_code, name, photo_ref FROM students ORDER BY id",
                )?;
                let students = stmt
                    .query_map([], student_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(students)
            })
            .await
    }

    /// Replace a student's fields, returning the number of rows changed
    ///
    /// # Errors
    ///
    /// Same as [`SqliteStudentDirectory::create_student`].
    pub async fn update_student(
        &self,
        id: StudentId,
        student: NewStudent,
    ) -> Result<usize, LedgerError> {
        student.validate()?;
        let changed = self
            .store
            .run("update_student", move |conn| {
                conn.execute(
                    "UPDATE students SET registration_code = ?1, name = ?2, photo_ref = ?3
                     WHERE id = ?4",
                    params![student.registration_code, student.name, student.photo_ref, id],
                )
                .map_err(|e| student_write_error(e, Some(id), &student.registration_code))
            })
            .await?;
        tracing::debug!(student_id = %id, changed, "student updated");
        Ok(changed)
    }

    /// Remove a student, returning the number of rows changed
    ///
    /// # Errors
    ///
    /// [`LedgerError::StudentReferenced`] while any permission points at the student.
    pub async fn delete_student(&self, id: StudentId) -> Result<usize, LedgerError> {
        let changed = self
            .store
            .run("delete_student", move |conn| {
                conn.execute("DELETE FROM students WHERE id = ?1", params![id])
                    .map_err(|e| student_write_error(e, Some(id), ""))
            })
            .await?;
        tracing::debug!(student_id = %id, changed, "student deleted");
        Ok(changed)
    }
}

#[async_trait]
impl StudentDirectory for SqliteStudentDirectory {
    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, LedgerError> {
        self.store
            .run("get_student", move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, registration_code, name, photo_ref FROM students WHERE id = ?1",
                        params![id],
                        student_from_row,
                    )
                    .optional()?)
            })
            .await
    }
}
