use std::time::Duration;

use agrisense_agent::errors::{CollectError, ErrorKind};
use agrisense_agent::models::{Readings, SensorRole};
use agrisense_agent::services::CollectorState;
use agrisense_api::Status;
use serde_json::json;

mod common;
use common::mock_app::{
    credentials, ArtifactMode, MockApp, MockArtifacts, MockLink, MockUploader, Reply, ENV_LINE, SOIL_LINE,
};

#[tokio::test]
async fn test_collect_soil() {
    let (soil, counters) = MockLink::new("/dev/ttyUSB0", vec![Reply::line(SOIL_LINE)]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil)]);

    let result = app.collector.collect(SensorRole::Soil).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.error.is_none());
    assert_eq!(counters.sends(), 1);

    let record = result.record.as_ref().unwrap();
    assert_eq!(record.address, 1);
    assert_eq!(record.temperature, 25.5);
    assert_eq!(record.humidity, 65.0);
    assert!(matches!(record.readings, Readings::Soil(_)));

    let artifact = result.artifact_path.as_ref().unwrap();
    assert!(artifact.is_file());
    assert!(artifact.file_name().unwrap().to_string_lossy().starts_with("farm_"));

    let response = result.upload_response.as_ref().unwrap();
    assert_eq!(response.records_created, 8);
    assert_eq!(response.ai_task_id, Some(json!("task-1")));

    let calls = app.uploader.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, SensorRole::Soil);
    assert_eq!(calls[0].2.as_ref(), Some(artifact));
    drop(calls);

    assert_eq!(app.status.statuses(), vec![Status::Collecting, Status::Collected]);
    let (_, details) = app.status.last().unwrap();
    let details = details.unwrap();
    assert_eq!(details["role"], json!("soil"));
    assert_eq!(details["records_created"], json!(8));
    assert_eq!(details["ai_task_id"], json!("task-1"));

    assert_eq!(app.collector.state(), CollectorState::Idle);
}

#[tokio::test]
async fn test_collect_environmental_without_artifact() {
    let (env, _) = MockLink::new("/dev/ttyUSB1", vec![Reply::line(ENV_LINE)]);
    let app = MockApp::new(vec![(SensorRole::Environmental, env)]);

    let result = app.collector.collect(SensorRole::Environmental).await;

    assert!(result.success);
    assert!(result.artifact_path.is_none());
    assert_eq!(app.artifacts.count(), 0);

    let calls = app.uploader.calls.lock().unwrap();
    assert_eq!(calls[0].0, SensorRole::Environmental);
    assert!(calls[0].2.is_none());
    // environmental temperature is not rescaled
    assert_eq!(calls[0].1.temperature, 24.5);
}

#[tokio::test]
async fn test_collect_not_connected() {
    let (soil, counters) = MockLink::new("/dev/ttyUSB0", vec![Reply::line(SOIL_LINE)]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil)]);

    let result = app.collector.collect(SensorRole::Environmental).await;

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::NotConnected));
    assert_eq!(counters.sends(), 0);
    assert!(!app.collector.connected(SensorRole::Environmental));
    assert_eq!(app.collector.state(), CollectorState::Idle);
}

#[tokio::test]
async fn test_collect_no_response() {
    let (soil, counters) = MockLink::new("/dev/ttyUSB0", vec![Reply::Timeout, Reply::line(SOIL_LINE)]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil)]);

    let result = app.collector.collect(SensorRole::Soil).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NoResponse));
    assert_eq!(app.uploader.count(), 0);

    // a timeout keeps the channel, the caller may try again
    assert!(app.collector.connected(SensorRole::Soil));
    assert_eq!(counters.closes(), 0);

    let result = app.collector.collect(SensorRole::Soil).await;
    assert!(result.success);
    assert_eq!(counters.sends(), 2);
}

#[tokio::test]
async fn test_read_fault_closes_channel() {
    let (soil, counters) = MockLink::new("/dev/ttyUSB0", vec![Reply::ReadFault, Reply::line(SOIL_LINE)]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil)]);

    let result = app.collector.collect(SensorRole::Soil).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::LinkFault));
    assert!(!app.collector.connected(SensorRole::Soil));
    assert_eq!(counters.closes(), 1);

    let result = app.collector.collect(SensorRole::Soil).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotConnected));
    assert_eq!(counters.sends(), 1);
}

#[tokio::test]
async fn test_write_fault_closes_channel() {
    let (env, counters) = MockLink::new("/dev/ttyUSB1", vec![Reply::WriteFault]);
    let app = MockApp::new(vec![(SensorRole::Environmental, env)]);

    let result = app.collector.collect(SensorRole::Environmental).await;

    assert!(matches!(
        result.error,
        Some(CollectError::LinkFault {
            role: SensorRole::Environmental,
            ..
        })
    ));
    assert_eq!(counters.closes(), 1);
}

#[tokio::test]
async fn test_parse_error_keeps_raw_line() {
    let (soil, _) = MockLink::new("/dev/ttyUSB0", vec![Reply::line("1,255,650")]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil)]);

    let result = app.collector.collect(SensorRole::Soil).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ParseError));
    assert_eq!(result.raw_line(), Some("1,255,650"));
    assert!(result.record.is_none());
    assert_eq!(app.artifacts.count(), 0);
    assert_eq!(app.uploader.count(), 0);

    let (status, details) = app.status.last().unwrap();
    assert_eq!(status, Status::Error);
    assert_eq!(details.unwrap()["kind"], json!("parse_error"));
}

#[tokio::test]
async fn test_soil_needs_artifact() {
    for mode in [ArtifactMode::Vanishing, ArtifactMode::Failing] {
        let (soil, _) = MockLink::new("/dev/ttyUSB0", vec![Reply::line(SOIL_LINE)]);
        let app = MockApp::build(
            vec![(SensorRole::Soil, soil)],
            MockUploader::default(),
            MockArtifacts::new(mode),
            Some(credentials()),
        );

        let result = app.collector.collect(SensorRole::Soil).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::ArtifactError));
        assert!(result.record.is_some());
        assert_eq!(app.uploader.count(), 0);
        assert_eq!(app.collector.state(), CollectorState::Idle);
    }
}

#[tokio::test]
async fn test_missing_credentials() {
    let (env, _) = MockLink::new("/dev/ttyUSB1", vec![Reply::line(ENV_LINE)]);
    let app = MockApp::build(
        vec![(SensorRole::Environmental, env)],
        MockUploader::default(),
        MockArtifacts::new(ArtifactMode::Present),
        None,
    );

    let result = app.collector.collect(SensorRole::Environmental).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ConfigError));
    assert_eq!(app.uploader.count(), 0);
}

#[tokio::test]
async fn test_upload_failure() {
    let (soil, _) = MockLink::new("/dev/ttyUSB0", vec![Reply::line(SOIL_LINE)]);
    let app = MockApp::build(
        vec![(SensorRole::Soil, soil)],
        MockUploader::failing(503),
        MockArtifacts::new(ArtifactMode::Present),
        Some(credentials()),
    );

    let result = app.collector.collect(SensorRole::Soil).await;

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::UploadError));
    assert!(result.artifact_path.is_some());
    assert!(result.upload_response.is_none());
    assert_eq!(app.uploader.count(), 1);
    assert_eq!(app.collector.state(), CollectorState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_collection_is_busy() {
    let (soil, soil_counters) = MockLink::new("/dev/ttyUSB0", vec![Reply::line(SOIL_LINE)]);
    let (soil, release) = soil.gated();
    let (env, env_counters) = MockLink::new("/dev/ttyUSB1", vec![Reply::line(ENV_LINE)]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil), (SensorRole::Environmental, env)]);

    let collector = app.collector.clone();
    let first = tokio::spawn(async move { collector.collect(SensorRole::Soil).await });

    app.wait_until_collecting().await;
    assert_eq!(app.collector.state(), CollectorState::Collecting(SensorRole::Soil));

    let second = app.collector.collect(SensorRole::Environmental).await;
    assert!(matches!(second.error, Some(CollectError::Busy)));
    assert_eq!(env_counters.sends(), 0);

    let again = app.collector.collect(SensorRole::Soil).await;
    assert_eq!(again.error_kind(), Some(ErrorKind::Busy));

    release.send(()).unwrap();
    let first = first.await.unwrap();

    assert!(first.success);
    assert_eq!(soil_counters.sends(), 1);
    assert_eq!(app.uploader.count(), 1);
    assert_eq!(app.collector.state(), CollectorState::Idle);
}

#[tokio::test]
async fn test_idle_after_panicking_cycle() {
    let (soil, _) = MockLink::new("/dev/ttyUSB0", vec![Reply::line(SOIL_LINE), Reply::line(SOIL_LINE)]);
    let app = MockApp::build(
        vec![(SensorRole::Soil, soil)],
        MockUploader::panicking(),
        MockArtifacts::new(ArtifactMode::Present),
        Some(credentials()),
    );

    let collector = app.collector.clone();
    let outcome = tokio::spawn(async move { collector.collect(SensorRole::Soil).await }).await;

    assert!(outcome.unwrap_err().is_panic());
    assert_eq!(app.collector.state(), CollectorState::Idle);

    let result = app.collector.collect(SensorRole::Soil).await;
    assert!(result.success);
}

#[tokio::test]
async fn test_idle_after_panicking_link() {
    let (env, counters) = MockLink::new("/dev/ttyUSB1", vec![Reply::Panic, Reply::line(ENV_LINE)]);
    let app = MockApp::new(vec![(SensorRole::Environmental, env)]);

    let result = app.collector.collect(SensorRole::Environmental).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::LinkFault));
    assert_eq!(app.collector.state(), CollectorState::Idle);
    assert_eq!(counters.closes(), 1);
    assert!(!app.collector.connected(SensorRole::Environmental));
    assert_eq!(app.status.statuses(), vec![Status::Collecting, Status::Error]);

    let next = app.collector.collect(SensorRole::Environmental).await;

    assert_eq!(next.error_kind(), Some(ErrorKind::NotConnected));
    assert_eq!(counters.sends(), 1);
    assert_eq!(app.collector.state(), CollectorState::Idle);
}

#[tokio::test]
async fn test_collect_all_succeeds_if_only_soil_does() {
    let (soil, _) = MockLink::new("/dev/ttyUSB0", vec![Reply::line(SOIL_LINE)]);
    let (env, _) = MockLink::new("/dev/ttyUSB1", vec![Reply::Timeout]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil), (SensorRole::Environmental, env)]);

    let result = app.collector.collect_all().await;

    assert!(result.success());
    assert!(result.soil.success);
    assert_eq!(result.environmental.error_kind(), Some(ErrorKind::NoResponse));

    let roles: Vec<SensorRole> = app.uploader.calls.lock().unwrap().iter().map(|call| call.0).collect();
    assert_eq!(roles, vec![SensorRole::Soil]);
}

#[tokio::test]
async fn test_collect_all_succeeds_if_either_does() {
    let (soil, _) = MockLink::new("/dev/ttyUSB0", vec![Reply::line("garbage")]);
    let (env, _) = MockLink::new("/dev/ttyUSB1", vec![Reply::line(ENV_LINE)]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil), (SensorRole::Environmental, env)]);

    let result = app.collector.collect_all().await;

    assert!(result.success());
    assert_eq!(result.soil.error_kind(), Some(ErrorKind::ParseError));
    assert!(result.environmental.success);

    let roles: Vec<SensorRole> = app.uploader.calls.lock().unwrap().iter().map(|call| call.0).collect();
    assert_eq!(roles, vec![SensorRole::Environmental]);
}

#[tokio::test]
async fn test_collect_all_fails_if_both_do() {
    let (soil, _) = MockLink::new("/dev/ttyUSB0", vec![Reply::Timeout]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil)]);

    let result = app.collector.collect_all().await;

    assert!(!result.success());
    assert_eq!(result.soil.error_kind(), Some(ErrorKind::NoResponse));
    assert_eq!(result.environmental.error_kind(), Some(ErrorKind::NotConnected));
}

#[tokio::test]
async fn test_shutdown_closes_each_channel_once() {
    let (soil, soil_counters) = MockLink::new("/dev/ttyUSB0", vec![]);
    let (env, env_counters) = MockLink::new("/dev/ttyUSB1", vec![]);
    let app = MockApp::new(vec![(SensorRole::Soil, soil), (SensorRole::Environmental, env)]);

    assert_eq!(app.collector.channel_count(), 2);

    app.collector.shutdown();
    app.collector.shutdown();

    assert_eq!(soil_counters.closes(), 1);
    assert_eq!(env_counters.closes(), 1);
    assert!(!app.collector.connected(SensorRole::Soil));

    let result = app.collector.collect(SensorRole::Soil).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotConnected));
}

#[tokio::test]
async fn test_close_waits_off_the_runtime() {
    let (soil, counters) = MockLink::new("/dev/ttyUSB0", vec![Reply::line(SOIL_LINE)]);
    let (soil, release) = soil.gated();
    let app = MockApp::new(vec![(SensorRole::Soil, soil)]);

    let collector = app.collector.clone();
    let cycle = tokio::spawn(async move { collector.collect(SensorRole::Soil).await });
    app.wait_until_collecting().await;

    let closing = tokio::spawn(app.collector.clone().close());

    // the only runtime thread stays free while the close waits for the link
    tokio::time::sleep(Duration::from_millis(50)).await;
    release.send(()).ok();

    closing.await.unwrap();
    cycle.await.unwrap();

    assert_eq!(counters.closes(), 1);
    assert!(!app.collector.connected(SensorRole::Soil));
    assert_eq!(app.collector.state(), CollectorState::Idle);
}
