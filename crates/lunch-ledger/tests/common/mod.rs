//! Shared fixtures for ledger integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use lunch_ledger::{
    FulfilledRecordPolicy, NewStudent, PermissionLedger, SqliteStore, SqliteStudentDirectory,
    StudentId,
};

pub struct Harness {
    pub ledger: PermissionLedger,
    pub directory: Arc<SqliteStudentDirectory>,
}

pub fn harness() -> Harness {
    harness_with_policy(FulfilledRecordPolicy::Locked)
}

pub fn harness_with_policy(policy: FulfilledRecordPolicy) -> Harness {
    let store = SqliteStore::in_memory(Duration::from_secs(5)).expect("in-memory store");
    from_store(store, policy)
}

pub fn from_store(store: SqliteStore, policy: FulfilledRecordPolicy) -> Harness {
    let directory = Arc::new(SqliteStudentDirectory::new(store.clone()));
    let ledger = PermissionLedger::new(store, directory.clone(), policy);
    Harness { ledger, directory }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

impl Harness {
    pub async fn student(&self, code: &str, name: &str) -> StudentId {
        self.directory
            .create_student(NewStudent::new(code, name, format!("photos/{code}.jpg")))
            .await
            .expect("create student")
    }
}
