use std::sync::Arc;
use std::time::Duration;

use analysis_core::config::{AnalysisConfig, JobExecutorMode};
use analysis_core::models::JobStatus;
use analysis_core::traits::CatalogManager;
use analysis_dispatcher::JobDispatcher;
use analysis_errors::AnalysisError;
use analysis_testing_utils::{JobBuilder, MockCatalog, MockExecutorManager, MockOutcome, TestEnv};

#[tokio::test]
async fn test_abort_cancels_pending_dispatch() {
    let temp = tempfile::tempdir().unwrap();
    let catalog: Arc<dyn CatalogManager> = Arc::new(MockCatalog::new(temp.path()));
    let manager = MockExecutorManager::new("local", MockOutcome::Hang);
    let dispatcher = JobDispatcher::new(catalog, Arc::new(manager.clone()));

    let handle = dispatcher.dispatch(JobBuilder::new().with_id(7).build());
    assert_eq!(handle.job_id(), 7);
    let started = TestEnv::wait_for(
        || {
            let manager = manager.clone();
            async move { !manager.runs().is_empty() }
        },
        Duration::from_secs(2),
    )
    .await;
    assert!(started);

    handle.abort();
    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, AnalysisError::AnalysisExecution { .. }));
}

#[tokio::test]
async fn test_sge_failure_is_reported_as_execution_error() {
    let temp = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockCatalog::new(temp.path()));
    let job = mock.add_job(JobBuilder::new().with_id(3).with_status(JobStatus::Running).build());
    let catalog: Arc<dyn CatalogManager> = mock.clone();

    let dispatcher = JobDispatcher::new(
        catalog,
        Arc::new(MockExecutorManager::new("local", MockOutcome::Hang)),
    )
    .with_sge(Arc::new(MockExecutorManager::new(
        "sge",
        MockOutcome::Fail("qsub: command not found".to_string()),
    )))
    .with_mode(JobExecutorMode::Sge);

    let err = dispatcher.dispatch(job).wait().await.unwrap_err();
    assert!(err.to_string().contains("sge execution failed"));
    assert_eq!(mock.job(3).unwrap().status, JobStatus::Running);
}

#[tokio::test]
async fn test_sge_mode_without_manager_is_a_config_error() {
    let temp = tempfile::tempdir().unwrap();
    let catalog: Arc<dyn CatalogManager> = Arc::new(MockCatalog::new(temp.path()));
    let config = AnalysisConfig {
        job_executor: JobExecutorMode::Sge,
        dispatch_timeout_seconds: 0,
        ..Default::default()
    };
    let dispatcher = JobDispatcher::from_config(
        &config,
        catalog,
        Arc::new(MockExecutorManager::new("local", MockOutcome::Hang)),
        None,
    );
    assert_eq!(dispatcher.mode(), JobExecutorMode::Sge);

    let err = dispatcher
        .dispatch(JobBuilder::new().build())
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Configuration(_)));
}
