use super::{new_job, seed_job};
use crate::db::*;
use crate::error::{Error, JobError};
use crate::types::{JobId, JobStatus, ReasonCode, ValidationVerdict};
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_insert_and_get_job() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let (job, addresses) = new_job("job-1", &["a@example.com", "b@example.org"]);
    db.insert_job(&job, &addresses).await.unwrap();

    let stored = db.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.id, job.id);
    assert_eq!(stored.status, JobStatus::Pending);
    assert_eq!(stored.total_addresses, 2);
    assert_eq!(stored.processed_count, 0);
    assert_eq!(stored.source_location, "uploads/job-1.csv");
    assert!(!stored.notified);
    assert_eq!(
        stored.created_at.timestamp_millis(),
        job.created_at.timestamp_millis()
    );

    // No verdicts yet, so every address is pending in ingestion order
    assert_eq!(db.pending_addresses(&job.id).await.unwrap(), addresses);

    db.close().await;
}

#[tokio::test]
async fn test_get_missing_job_returns_none() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert!(db.get_job(&JobId::new("nope")).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_duplicate_job_id_is_rejected_and_rolled_back() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    seed_job(&db, "job-dup", &["a@example.com"]).await;

    let (again, addresses) = new_job("job-dup", &["x@example.com", "y@example.com"]);
    let err = db.insert_job(&again, &addresses).await.unwrap_err();
    assert!(matches!(err, Error::Job(JobError::AlreadyExists { .. })));

    // The original address sequence is untouched
    let stored = db.pending_addresses(&again.id).await.unwrap();
    assert_eq!(stored, vec!["a@example.com".to_string()]);

    db.close().await;
}

#[tokio::test]
async fn test_list_jobs_with_status_filter() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let a = seed_job(&db, "job-a", &["a@example.com"]).await;
    let b = seed_job(&db, "job-b", &["b@example.com"]).await;
    db.transition_status(&b, JobStatus::Pending, JobStatus::Processing, None)
        .await
        .unwrap();

    let all = db.list_jobs(None).await.unwrap();
    assert_eq!(all.len(), 2);

    let pending = db.list_jobs(Some(JobStatus::Pending)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, a);

    let processing = db.list_jobs(Some(JobStatus::Processing)).await.unwrap();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].id, b);

    db.close().await;
}

#[tokio::test]
async fn test_transition_status_compare_and_set() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let id = seed_job(&db, "job-cas", &["a@example.com"]).await;

    db.transition_status(&id, JobStatus::Pending, JobStatus::Processing, None)
        .await
        .unwrap();

    // Second writer with a stale expectation loses and learns the actual status
    let err = db
        .transition_status(&id, JobStatus::Pending, JobStatus::Failed, Some("late"))
        .await
        .unwrap_err();
    match err {
        Error::Job(JobError::StatusConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, JobStatus::Pending);
            assert_eq!(actual, JobStatus::Processing);
        }
        other => panic!("expected StatusConflict, got {other:?}"),
    }

    let job = db.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert!(job.failure_reason.is_none());

    db.close().await;
}

#[tokio::test]
async fn test_transition_records_failure_reason() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let id = seed_job(&db, "job-abort", &["a@example.com"]).await;

    db.transition_status(
        &id,
        JobStatus::Pending,
        JobStatus::Failed,
        Some("aborted by operator"),
    )
    .await
    .unwrap();

    let job = db.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason.as_deref(), Some("aborted by operator"));

    db.close().await;
}

#[tokio::test]
async fn test_transition_unknown_job_is_not_found() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let err = db
        .transition_status(
            &JobId::new("ghost"),
            JobStatus::Pending,
            JobStatus::Processing,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Job(JobError::NotFound { .. })));

    db.close().await;
}

#[tokio::test]
async fn test_claim_notification_once_and_only_when_terminal() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let id = seed_job(&db, "job-notify", &["a@example.com"]).await;

    assert!(
        !db.claim_notification(&id).await.unwrap(),
        "non-terminal jobs cannot be claimed"
    );

    db.transition_status(&id, JobStatus::Pending, JobStatus::Failed, None)
        .await
        .unwrap();

    assert!(db.claim_notification(&id).await.unwrap());
    assert!(!db.claim_notification(&id).await.unwrap());
    assert!(db.get_job(&id).await.unwrap().unwrap().notified);

    db.close().await;
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = std::sync::Arc::new(Database::new(temp_file.path()).await.unwrap());
    let id = seed_job(&db, "job-race", &["a@example.com"]).await;
    db.transition_status(&id, JobStatus::Pending, JobStatus::Failed, None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let db = db.clone();
        let id = id.clone();
        handles.push(tokio::spawn(
            async move { db.claim_notification(&id).await.unwrap() },
        ));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_pending_addresses_shrink_as_verdicts_arrive() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let id = seed_job(
        &db,
        "job-pending",
        &["a@example.com", "b@example.com", "c@example.com"],
    )
    .await;

    assert_eq!(db.pending_addresses(&id).await.unwrap().len(), 3);

    db.upsert_verdict(
        &id,
        &ValidationVerdict::new("b@example.com", ReasonCode::Valid, 0.8),
    )
    .await
    .unwrap();

    assert_eq!(
        db.pending_addresses(&id).await.unwrap(),
        vec!["a@example.com".to_string(), "c@example.com".to_string()]
    );

    db.close().await;
}

#[tokio::test]
async fn test_upsert_job_keeps_status_and_counts() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let (mut job, _) = new_job("job-upsert", &[]);
    job.total_addresses = 0;
    db.upsert_job(&job).await.unwrap();
    assert!(db.get_job(&job.id).await.unwrap().is_some());

    db.transition_status(&job.id, JobStatus::Pending, JobStatus::Processing, None)
        .await
        .unwrap();

    // Refreshing descriptive fields must not roll the status back
    job.source_location = "uploads/moved.csv".into();
    job.updated_at = chrono::Utc::now();
    db.upsert_job(&job).await.unwrap();

    let stored = db.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Processing);
    assert_eq!(stored.source_location, "uploads/moved.csv");

    db.close().await;
}

#[tokio::test]
async fn test_updated_at_never_decreases() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let id = seed_job(&db, "job-clock", &["a@example.com"]).await;

    let before = db.get_job(&id).await.unwrap().unwrap().updated_at;

    let (mut stale, _) = new_job("job-clock", &["a@example.com"]);
    stale.updated_at = before - chrono::Duration::hours(1);
    db.upsert_job(&stale).await.unwrap();

    let after = db.get_job(&id).await.unwrap().unwrap().updated_at;
    assert!(after >= before);

    db.close().await;
}

#[tokio::test]
async fn test_released_notification_can_be_claimed_again() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let id = seed_job(&db, "job-release", &["a@example.com"]).await;
    db.transition_status(&id, JobStatus::Pending, JobStatus::Failed, None)
        .await
        .unwrap();

    assert!(db.claim_notification(&id).await.unwrap());
    db.release_notification(&id).await.unwrap();
    assert!(!db.get_job(&id).await.unwrap().unwrap().notified);

    assert!(db.claim_notification(&id).await.unwrap());
    assert!(!db.claim_notification(&id).await.unwrap());

    db.close().await;
}
