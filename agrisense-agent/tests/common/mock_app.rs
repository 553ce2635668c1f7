#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agrisense_agent::errors::{ArtifactError, LinkError, UploadError};
use agrisense_agent::models::{SensorRecord, SensorRole};
use agrisense_agent::services::{
    ArtifactProvider, Calibration, Collector, CollectorState, Credentials, FrameParser, SensorLink,
    StatusReporter, Uploader,
};
use agrisense_api::{Status, UploadResponse};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tempfile::TempDir;

pub const SOIL_LINE: &str = "1,255,650,1.2,6.8,0.5,120,45,180";
pub const ENV_LINE: &str = "2,24.5,41.0,0.02,0.3,12,20,450,0";

/// What a mock device does on the next command.
#[derive(Debug, Clone)]
pub enum Reply {
    Line(String),
    Timeout,
    ReadFault,
    WriteFault,
    /// The link panics while reading.
    Panic,
}

impl Reply {
    pub fn line(line: &str) -> Self {
        Reply::Line(line.to_string())
    }
}

#[derive(Debug, Default)]
pub struct LinkCounters {
    pub sends: AtomicUsize,
    pub closes: AtomicUsize,
}

impl LinkCounters {
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct MockLink {
    port: String,
    replies: VecDeque<Reply>,
    pending: Option<Reply>,
    ok: bool,
    counters: Arc<LinkCounters>,
    gate: Option<Receiver<()>>,
}

impl MockLink {
    pub fn new(port: &str, replies: Vec<Reply>) -> (Self, Arc<LinkCounters>) {
        let counters = Arc::new(LinkCounters::default());

        (
            Self {
                port: port.to_string(),
                replies: replies.into(),
                pending: None,
                ok: true,
                counters: counters.clone(),
                gate: None,
            },
            counters,
        )
    }

    /// Holds every read until the returned sender fires or is dropped.
    pub fn gated(mut self) -> (Self, Sender<()>) {
        let (sender, receiver) = mpsc::channel();
        self.gate = Some(receiver);
        (self, sender)
    }
}

impl SensorLink for MockLink {
    fn port(&self) -> &str {
        &self.port
    }

    fn send(&mut self, _command: &str) -> Result<(), LinkError> {
        self.counters.sends.fetch_add(1, Ordering::SeqCst);

        match self.replies.pop_front() {
            Some(Reply::WriteFault) => {
                self.ok = false;
                Err(LinkError::IncompleteWrite {
                    port: self.port.clone(),
                })
            }
            reply => {
                self.pending = reply;
                Ok(())
            }
        }
    }

    fn receive(&mut self) -> String {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }

        match self.pending.take() {
            Some(Reply::Line(line)) => {
                self.ok = true;
                line
            }
            Some(Reply::ReadFault) => {
                self.ok = false;
                String::new()
            }
            Some(Reply::Panic) => panic!("link on {} blew up", self.port),
            _ => {
                self.ok = true;
                String::new()
            }
        }
    }

    fn is_ok(&self) -> bool {
        self.ok
    }

    fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockUploader {
    pub calls: Mutex<Vec<(SensorRole, SensorRecord, Option<PathBuf>)>>,
    pub fail_status: Option<u16>,
    pub panic_once: AtomicBool,
}

impl MockUploader {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Default::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic_once: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload(
        &self,
        role: SensorRole,
        record: &SensorRecord,
        artifact: Option<&Path>,
        _credentials: &Credentials,
    ) -> Result<UploadResponse, UploadError> {
        if self.panic_once.swap(false, Ordering::SeqCst) {
            panic!("uploader blew up");
        }

        self.calls
            .lock()
            .unwrap()
            .push((role, record.clone(), artifact.map(Path::to_path_buf)));

        if let Some(status) = self.fail_status {
            return Err(UploadError::status(status, "server error"));
        }

        Ok(UploadResponse {
            records_created: record.fields().len() as i64 + 2,
            ai_task_id: role.requires_artifact().then(|| Value::from("task-1")),
            farm_id: Some(Value::from("farm-1")),
            extra: Map::new(),
        })
    }
}

pub enum ArtifactMode {
    Present,
    /// Reports a path that was never written.
    Vanishing,
    Failing,
}

pub struct MockArtifacts {
    pub dir: TempDir,
    pub mode: ArtifactMode,
    pub calls: AtomicUsize,
}

impl MockArtifacts {
    pub fn new(mode: ArtifactMode) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactProvider for MockArtifacts {
    async fn get_artifact(&self, filename: &str) -> Result<PathBuf, ArtifactError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.path().join(filename);

        match self.mode {
            ArtifactMode::Present => {
                std::fs::write(&path, b"\xFF\xD8\xFF\xE0")?;
                Ok(path)
            }
            ArtifactMode::Vanishing => Ok(path),
            ArtifactMode::Failing => Err(ArtifactError::Capture {
                program: "camera".into(),
                message: "no device".into(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub events: Mutex<Vec<(Status, Option<Map<String, Value>>)>>,
}

impl RecordingStatus {
    pub fn statuses(&self) -> Vec<Status> {
        self.events.lock().unwrap().iter().map(|(status, _)| *status).collect()
    }

    pub fn last(&self) -> Option<(Status, Option<Map<String, Value>>)> {
        self.events.lock().unwrap().last().cloned()
    }
}

impl StatusReporter for RecordingStatus {
    fn report(&self, status: Status, details: Option<Map<String, Value>>) {
        self.events.lock().unwrap().push((status, details));
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        endpoint: "http://localhost:8000/v1/iot/sensor-data".into(),
        api_key: "test-key".into(),
    }
}

pub struct MockApp {
    pub collector: Arc<Collector>,
    pub uploader: Arc<MockUploader>,
    pub artifacts: Arc<MockArtifacts>,
    pub status: Arc<RecordingStatus>,
}

impl MockApp {
    pub fn new(links: Vec<(SensorRole, MockLink)>) -> Self {
        Self::build(links, MockUploader::default(), MockArtifacts::new(ArtifactMode::Present), Some(credentials()))
    }

    pub fn build(
        links: Vec<(SensorRole, MockLink)>,
        uploader: MockUploader,
        artifacts: MockArtifacts,
        credentials: Option<Credentials>,
    ) -> Self {
        let uploader = Arc::new(uploader);
        let artifacts = Arc::new(artifacts);
        let status = Arc::new(RecordingStatus::default());

        let parser = FrameParser::new(
            Calibration {
                temperature: 10.0,
                humidity: 10.0,
            },
            Calibration::default(),
        );

        let collector = links.into_iter().fold(
            Collector::new(parser, artifacts.clone(), uploader.clone(), credentials)
                .with_status(status.clone())
                .with_pause(Duration::ZERO),
            |collector, (role, link)| collector.with_channel(role, Box::new(link)),
        );

        Self {
            collector: Arc::new(collector),
            uploader,
            artifacts,
            status,
        }
    }

    pub async fn wait_until_collecting(&self) {
        for _ in 0..200 {
            if matches!(self.collector.state(), CollectorState::Collecting(_)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("collector never started");
    }
}
