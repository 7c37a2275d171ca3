mod common;

use assert_matches::assert_matches;
use common::{date, harness, harness_with_policy};
use lunch_ledger::{
    DeliveryState, FulfilledRecordPolicy, LedgerError, PermissionFilter, PermissionId, Quantity,
    StudentId,
};

#[tokio::test]
async fn create_then_list_for_date() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;

    let p1 = h
        .ledger
        .create_permission(s1, date(2024, 5, 1), 2)
        .await
        .expect("create");

    let rows = h
        .ledger
        .list_permissions(PermissionFilter::on(date(2024, 5, 1)))
        .await
        .expect("list");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.permission.id, p1);
    assert_eq!(row.permission.student_id, s1);
    assert_eq!(row.permission.quantity.get(), 2);
    assert!(!row.permission.delivered);
    assert_eq!(row.student_name, "Ana");
    assert_eq!(row.student_photo_ref, "photos/RA-001.jpg");
}

#[tokio::test]
async fn every_valid_quantity_is_accepted_once_per_pair() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;

    for (day, quantity) in [(1, 1), (2, 2), (3, 3)] {
        h.ledger
            .create_permission(s1, date(2024, 5, day), quantity)
            .await
            .expect("valid quantity");
        assert_matches!(
            h.ledger
                .create_permission(s1, date(2024, 5, day), quantity)
                .await,
            Err(LedgerError::DuplicateKey { .. })
        );
    }

    let all = h
        .ledger
        .list_permissions(PermissionFilter::all())
        .await
        .expect("list");
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn duplicate_pair_leaves_single_record() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;
    let day = date(2024, 5, 1);

    h.ledger.create_permission(s1, day, 1).await.expect("first");
    let err = h
        .ledger
        .create_permission(s1, day, 3)
        .await
        .expect_err("second create must fail");
    assert_eq!(
        err,
        LedgerError::DuplicateKey {
            student_id: s1,
            release_date: day
        }
    );

    let rows = h
        .ledger
        .list_permissions(PermissionFilter::on(day))
        .await
        .expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].permission.quantity, Quantity::MIN);
}

#[tokio::test]
async fn out_of_range_quantity_is_rejected_and_not_persisted() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;

    for quantity in [0, 4, -1, 100] {
        assert_matches!(
            h.ledger
                .create_permission(s1, date(2024, 5, 1), quantity)
                .await,
            Err(LedgerError::ConstraintViolation { .. })
        );
    }

    let rows = h
        .ledger
        .list_permissions(PermissionFilter::all())
        .await
        .expect("list");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn unknown_student_is_rejected() {
    let h = harness();
    assert_matches!(
        h.ledger
            .create_permission(StudentId::new(999), date(2024, 5, 1), 1)
            .await,
        Err(LedgerError::UnknownStudent { student_id }) if student_id == StudentId::new(999)
    );
}

#[tokio::test]
async fn same_student_different_dates_and_same_date_different_students() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;
    let s2 = h.student("RA-002", "Bruno").await;

    h.ledger.create_permission(s1, date(2024, 5, 1), 1).await.expect("s1 d1");
    h.ledger.create_permission(s1, date(2024, 5, 2), 1).await.expect("s1 d2");
    h.ledger.create_permission(s2, date(2024, 5, 1), 1).await.expect("s2 d1");
}

#[tokio::test]
async fn update_overwrites_fields_but_not_delivery() {
    let h = harness_with_policy(FulfilledRecordPolicy::Mutable);
    let s1 = h.student("RA-001", "Ana").await;
    let s2 = h.student("RA-002", "Bruno").await;
    let p1 = h
        .ledger
        .create_permission(s1, date(2024, 5, 1), 1)
        .await
        .expect("create");
    h.ledger.confirm_delivery(p1).await.expect("deliver");

    let changed = h
        .ledger
        .update_permission(p1, s2, date(2024, 5, 3), 3)
        .await
        .expect("update");
    assert_eq!(changed, 1);

    let permission = h
        .ledger
        .get_permission(p1)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(permission.student_id, s2);
    assert_eq!(permission.release_date, date(2024, 5, 3));
    assert_eq!(permission.quantity, Quantity::MAX);
    assert!(permission.delivered);
}

#[tokio::test]
async fn update_missing_id_changes_nothing() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;
    let changed = h
        .ledger
        .update_permission(PermissionId::new(42), s1, date(2024, 5, 1), 2)
        .await
        .expect("update");
    assert_eq!(changed, 0);
}

#[tokio::test]
async fn update_into_taken_pair_is_duplicate_key() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;
    let s2 = h.student("RA-002", "Bruno").await;
    h.ledger.create_permission(s1, date(2024, 5, 1), 1).await.expect("p1");
    let p2 = h
        .ledger
        .create_permission(s2, date(2024, 5, 1), 1)
        .await
        .expect("p2");

    assert_matches!(
        h.ledger.update_permission(p2, s1, date(2024, 5, 1), 2).await,
        Err(LedgerError::DuplicateKey { student_id, .. }) if student_id == s1
    );

    // Rewriting a record onto its own pair is not a conflict.
    let changed = h
        .ledger
        .update_permission(p2, s2, date(2024, 5, 1), 2)
        .await
        .expect("self update");
    assert_eq!(changed, 1);
}

#[tokio::test]
async fn update_validates_quantity_first() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;
    let p1 = h
        .ledger
        .create_permission(s1, date(2024, 5, 1), 1)
        .await
        .expect("create");
    assert_matches!(
        h.ledger.update_permission(p1, s1, date(2024, 5, 1), 4).await,
        Err(LedgerError::ConstraintViolation { .. })
    );
}

#[tokio::test]
async fn delete_missing_id_returns_zero() {
    let h = harness();
    let changed = h
        .ledger
        .delete_permission(PermissionId::new(12345))
        .await
        .expect("delete");
    assert_eq!(changed, 0);
}

#[tokio::test]
async fn delete_pending_permission() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;
    let p1 = h
        .ledger
        .create_permission(s1, date(2024, 5, 1), 1)
        .await
        .expect("create");
    assert_eq!(h.ledger.delete_permission(p1).await.expect("delete"), 1);
    assert!(h.ledger.get_permission(p1).await.expect("get").is_none());

    // The pair is free again.
    h.ledger
        .create_permission(s1, date(2024, 5, 1), 2)
        .await
        .expect("recreate");
}

#[tokio::test]
async fn locked_policy_freezes_delivered_permissions() {
    let h = harness();
    let s1 = h.student("RA-001", "Ana").await;
    let p1 = h
        .ledger
        .create_permission(s1, date(2024, 5, 1), 2)
        .await
        .expect("create");
    h.ledger.confirm_delivery(p1).await.expect("deliver");

    assert_matches!(
        h.ledger.update_permission(p1, s1, date(2024, 5, 2), 1).await,
        Err(LedgerError::FulfilledRecordLocked { permission_id }) if permission_id == p1
    );
    assert_matches!(
        h.ledger.delete_permission(p1).await,
        Err(LedgerError::FulfilledRecordLocked { .. })
    );

    let permission = h
        .ledger
        .get_permission(p1)
        .await
        .expect("get")
        .expect("still there");
    assert_eq!(permission.release_date, date(2024, 5, 1));
    assert_eq!(permission.quantity.get(), 2);
}

#[tokio::test]
async fn mutable_policy_allows_deleting_delivered_permissions() {
    let h = harness_with_policy(FulfilledRecordPolicy::Mutable);
    assert_eq!(h.ledger.policy(), FulfilledRecordPolicy::Mutable);
    let s1 = h.student("RA-001", "Ana").await;
    let p1 = h
        .ledger
        .create_permission(s1, date(2024, 5, 1), 2)
        .await
        .expect("create");
    h.ledger.confirm_delivery(p1).await.expect("deliver");
    assert_eq!(h.ledger.delete_permission(p1).await.expect("delete"), 1);
}

#[tokio::test]
async fn mutable_policy_update_keeps_delivered_flag() {
    let h = harness_with_policy(FulfilledRecordPolicy::Mutable);
    let s1 = h.student("RA-001", "Ana").await;
    let p1 = h
        .ledger
        .create_permission(s1, date(2024, 5, 1), 1)
        .await
        .expect("create");
    h.ledger.confirm_delivery(p1).await.expect("deliver");

    let changed = h
        .ledger
        .update_permission(p1, s1, date(2024, 5, 1), 2)
        .await
        .expect("update delivered permission");
    assert_eq!(changed, 1);

    let permission = h
        .ledger
        .get_permission(p1)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(permission.quantity.get(), 2);
    assert!(permission.delivered);
    assert_matches!(
        h.ledger.confirm_delivery(p1).await,
        Err(LedgerError::AlreadyDeliveredOrNotFound { .. })
    );
}

#[tokio::test]
async fn date_filter_and_default_ordering() {
    let h = harness();
    let ana = h.student("RA-001", "Ana").await;
    let bruno = h.student("RA-002", "Bruno").await;

    // Inserted out of order on purpose.
    h.ledger.create_permission(bruno, date(2024, 5, 2), 1).await.expect("b2");
    h.ledger.create_permission(bruno, date(2024, 5, 1), 1).await.expect("b1");
    h.ledger.create_permission(ana, date(2024, 5, 2), 1).await.expect("a2");
    h.ledger.create_permission(ana, date(2024, 5, 1), 1).await.expect("a1");

    let all = h
        .ledger
        .list_permissions(PermissionFilter::all())
        .await
        .expect("list");
    let order: Vec<_> = all
        .iter()
        .map(|r| (r.permission.release_date, r.permission.student_id))
        .collect();
    assert_eq!(
        order,
        vec![
            (date(2024, 5, 1), ana),
            (date(2024, 5, 1), bruno),
            (date(2024, 5, 2), ana),
            (date(2024, 5, 2), bruno),
        ]
    );

    let second = h
        .ledger
        .list_permissions(PermissionFilter::on(date(2024, 5, 2)))
        .await
        .expect("list");
    assert_eq!(second.len(), 2);
    assert!(second
        .iter()
        .all(|r| r.permission.release_date == date(2024, 5, 2)));

    let empty = h
        .ledger
        .list_permissions(PermissionFilter::on(date(2024, 6, 1)))
        .await
        .expect("list");
    assert!(empty.is_empty());
}

#[tokio::test]
async fn pending_and_delivered_partition_the_date() {
    let h = harness();
    let ana = h.student("RA-001", "Ana").await;
    let bruno = h.student("RA-002", "Bruno").await;
    let day = date(2024, 5, 1);
    let pa = h.ledger.create_permission(ana, day, 1).await.expect("pa");
    let pb = h.ledger.create_permission(bruno, day, 2).await.expect("pb");
    h.ledger.confirm_delivery(pa).await.expect("deliver");

    let pending = h.ledger.list_pending(Some(day)).await.expect("pending");
    let delivered = h.ledger.list_deliveries(Some(day)).await.expect("delivered");
    assert_eq!(
        pending.iter().map(|r| r.permission.id).collect::<Vec<_>>(),
        vec![pb]
    );
    assert_eq!(
        delivered.iter().map(|r| r.permission.id).collect::<Vec<_>>(),
        vec![pa]
    );

    let filter = PermissionFilter {
        release_date: Some(day),
        state: DeliveryState::Any,
    };
    assert_eq!(
        h.ledger.list_permissions(filter).await.expect("all").len(),
        2
    );
}

#[tokio::test]
async fn on_disk_store_survives_reopen() {
    use std::time::Duration;

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("lunch.db");

    let p1 = {
        let store = lunch_ledger::SqliteStore::open(&path, Duration::from_secs(5)).expect("open");
        let h = common::from_store(store, FulfilledRecordPolicy::Locked);
        let s1 = h.student("RA-001", "Ana").await;
        h.ledger
            .create_permission(s1, date(2024, 5, 1), 2)
            .await
            .expect("create")
    };

    let store = lunch_ledger::SqliteStore::open(&path, Duration::from_secs(5)).expect("reopen");
    let h = common::from_store(store, FulfilledRecordPolicy::Locked);
    let rows = h
        .ledger
        .list_permissions(PermissionFilter::all())
        .await
        .expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].permission.id, p1);
}
