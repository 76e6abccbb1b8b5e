use super::*;

fn slow_config() -> crate::config::Config {
    let mut config = fast_config();
    config.pipeline.max_concurrent_units = 2;
    config
}

#[tokio::test]
async fn test_abort_stops_units_before_oracle() {
    let (pipeline, _temp_dir, notifier) = create_test_pipeline(
        slow_config(),
        ScriptedOracle::accepting().with_delay(Duration::from_millis(50)),
    )
    .await;

    let id = pipeline
        .submit_job(file_of("job-abort", &numbered(20)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    pipeline
        .abort_job(&id, Some("operator request".into()))
        .await
        .unwrap();
    wait_until_idle(&pipeline).await;

    let job = pipeline.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason.as_deref(), Some("operator request"));
    assert!(job.processed_count < 20, "processed {}", job.processed_count);
    assert!(pipeline.oracle_calls() < 20);

    let unprocessed = pipeline.unprocessed_addresses(&id).await.unwrap();
    assert_eq!(unprocessed.len() as u64, job.total_addresses - job.processed_count);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].status, JobStatus::Failed);
    assert_eq!(sent[0].failure_reason.as_deref(), Some("operator request"));
}

#[tokio::test]
async fn test_in_flight_verdicts_do_not_reopen_aborted_job() {
    let (pipeline, _temp_dir, notifier) = create_test_pipeline(
        slow_config(),
        ScriptedOracle::accepting().with_delay(Duration::from_millis(80)),
    )
    .await;

    let id = pipeline
        .submit_job(file("job-late", &["a@example.com", "b@example.com"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Both units are already waiting on the oracle
    pipeline.abort_job(&id, None).await.unwrap();
    wait_until_idle(&pipeline).await;

    let job = pipeline.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason.as_deref(), Some("aborted"));
    assert_eq!(job.processed_count, 2, "units past the check still record verdicts");
    assert_eq!(job.valid_count, 2);
    assert_eq!(notifier.count_for(&id), 1);
}

#[tokio::test]
async fn test_abort_terminal_job_is_rejected() {
    let (pipeline, _temp_dir, notifier) =
        create_test_pipeline(fast_config(), ScriptedOracle::accepting()).await;

    let id = pipeline
        .submit_job(file("job-done", &["a@example.com"]))
        .await
        .unwrap();
    wait_for_terminal(&pipeline, &id).await;

    let err = pipeline.abort_job(&id, None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Job(JobError::IllegalTransition {
            from: JobStatus::Completed,
            to: JobStatus::Failed,
            ..
        })
    ));

    let job = pipeline.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(notifier.count_for(&id), 1);
}

#[tokio::test]
async fn test_abort_unknown_job() {
    let (pipeline, _temp_dir, _notifier) =
        create_test_pipeline(fast_config(), ScriptedOracle::accepting()).await;

    let err = pipeline
        .abort_job(&JobId::new("job-missing"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Job(JobError::NotFound { .. })));
}

#[tokio::test]
async fn test_deadline_force_finalizes_job() {
    let mut config = fast_config();
    config.pipeline.max_concurrent_units = 1;
    config.pipeline.job_deadline = Duration::from_millis(150);
    let (pipeline, _temp_dir, notifier) = create_test_pipeline(
        config,
        ScriptedOracle::accepting().with_delay(Duration::from_millis(50)),
    )
    .await;

    let id = pipeline
        .submit_job(file_of("job-slow", &numbered(20)))
        .await
        .unwrap();

    let job = wait_for_terminal(&pipeline, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason.as_deref(), Some("deadline exceeded"));
    assert!(job.processed_count < job.total_addresses);

    let unprocessed = pipeline.unprocessed_addresses(&id).await.unwrap();
    assert!(!unprocessed.is_empty());
    assert_eq!(unprocessed.len() as u64, job.total_addresses - job.processed_count);

    // Unprocessed addresses are reported, never given a placeholder verdict
    let verdicts = pipeline.list_verdicts(&id).await.unwrap();
    assert!(verdicts.iter().all(|v| v.reason == ReasonCode::Valid));

    let report = pipeline.job_report(&id).await.unwrap();
    assert_eq!(report.unprocessed_count, unprocessed.len() as u64);
    assert_eq!(notifier.count_for(&id), 1);
}

#[tokio::test]
async fn test_unit_for_unknown_job_skips_oracle() {
    let (pipeline, _temp_dir, _notifier) =
        create_test_pipeline(fast_config(), ScriptedOracle::accepting()).await;
    let unit = crate::types::AddressValidationUnit {
        job_id: JobId::new("job-vanished"),
        address: "a@example.com".to_string(),
        attempt: 0,
    };

    pipeline
        .run_unit(unit, tokio_util::sync::CancellationToken::new())
        .await;

    assert_eq!(pipeline.oracle_calls(), 0);
    assert!(pipeline.get_job(&JobId::new("job-vanished")).await.unwrap().is_none());
}
