use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use agrisense_api::Status;
use serde_json::{json, Map, Value};
use time::OffsetDateTime;

use crate::configs::Sensors;
use crate::errors::{ArtifactError, CollectError};
use crate::models::{CollectAllResult, CollectionResult, SensorRole};
use crate::services::{
    artifact_filename, is_file, ArtifactProvider, Connector, Credentials, FrameParser, LinkSettings,
    PortResolver, SensorLink, Uploader,
};

/// Best-effort status publication. Must not block and must not fail.
pub trait StatusReporter: Send + Sync {
    fn report(&self, status: Status, details: Option<Map<String, Value>>);
}

pub struct NoopStatus;

impl StatusReporter for NoopStatus {
    fn report(&self, _status: Status, _details: Option<Map<String, Value>>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Collecting(SensorRole),
}

type SharedLink = Arc<Mutex<Option<Box<dyn SensorLink>>>>;

/// Runs collection cycles, one at a time across both roles.
///
/// Owns the sensor links. A second cycle requested while one is running fails
/// with [`CollectError::Busy`] instead of waiting.
pub struct Collector {
    channels: BTreeMap<SensorRole, SharedLink>,
    parser: FrameParser,
    artifacts: Arc<dyn ArtifactProvider>,
    uploader: Arc<dyn Uploader>,
    credentials: Option<Credentials>,
    status: Arc<dyn StatusReporter>,
    pause: Duration,
    state: Mutex<CollectorState>,
}

/// Puts the collector back to idle however the cycle ends, unwinding included.
struct CycleGuard<'a> {
    state: &'a Mutex<CollectorState>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = CollectorState::Idle;
    }
}

impl Collector {
    pub fn new(
        parser: FrameParser,
        artifacts: Arc<dyn ArtifactProvider>,
        uploader: Arc<dyn Uploader>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            channels: BTreeMap::new(),
            parser,
            artifacts,
            uploader,
            credentials,
            status: Arc::new(NoopStatus),
            pause: Duration::from_secs(1),
            state: Mutex::new(CollectorState::Idle),
        }
    }

    pub fn with_channel(mut self, role: SensorRole, link: Box<dyn SensorLink>) -> Self {
        tracing::info!(%role, "Sensor channel on {}", link.port());
        self.channels.insert(role, Arc::new(Mutex::new(Some(link))));
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = status;
        self
    }

    /// Pause between the soil and environmental halves of [`Collector::collect_all`].
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn state(&self) -> CollectorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connected(&self, role: SensorRole) -> bool {
        self.channels
            .get(&role)
            .is_some_and(|link| link.lock().unwrap_or_else(PoisonError::into_inner).is_some())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn begin(&self, role: SensorRole) -> Option<CycleGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != CollectorState::Idle {
            return None;
        }
        *state = CollectorState::Collecting(role);

        Some(CycleGuard { state: &self.state })
    }

    /// Reads, parses and uploads one role. Failures are carried in the result.
    pub async fn collect(&self, role: SensorRole) -> CollectionResult {
        let Some(_guard) = self.begin(role) else {
            tracing::warn!(%role, "Collection already in progress");
            return CollectionResult::failed(role, CollectError::Busy);
        };

        tracing::info!(%role, "Collection started");
        self.status.report(Status::Collecting, Some(role_details(role)));

        let mut result = CollectionResult::new(role);
        match self.run(role, &mut result).await {
            Ok(()) => {
                result.success = true;

                let mut details = role_details(role);
                if let Some(response) = &result.upload_response {
                    details.insert("records_created".into(), json!(response.records_created));
                    details.insert("ai_task_id".into(), json!(response.ai_task_id));
                    tracing::info!(
                        %role,
                        records_created = response.records_created,
                        "Collection uploaded"
                    );
                }
                self.status.report(Status::Collected, Some(details));
            }
            Err(e) => {
                let kind = e.kind();
                tracing::error!(%role, %kind, "Collection failed: {}", e);

                let mut details = role_details(role);
                details.insert("kind".into(), json!(kind));
                details.insert("message".into(), json!(e.to_string()));
                self.status.report(Status::Error, Some(details));

                result.error = Some(e);
            }
        }

        result
    }

    async fn run(&self, role: SensorRole, result: &mut CollectionResult) -> Result<(), CollectError> {
        let channel = self
            .channels
            .get(&role)
            .cloned()
            .ok_or(CollectError::NotConnected(role))?;

        let exchanging = channel.clone();
        let line = match tokio::task::spawn_blocking(move || exchange(&exchanging, role)).await {
            Ok(line) => line?,
            Err(e) => {
                let mut slot = channel.lock().unwrap_or_else(PoisonError::into_inner);
                return Err(drop_link(&mut slot, role, e.to_string()));
            }
        };

        let record = self.parser.parse(role, &line)?;
        result.record = Some(record.clone());

        let artifact = if role.requires_artifact() {
            let filename = artifact_filename(OffsetDateTime::now_utc());
            let path = self.artifacts.get_artifact(&filename).await?;
            if !is_file(&path).await {
                return Err(ArtifactError::Missing(path).into());
            }
            result.artifact_path = Some(path.clone());
            Some(path)
        } else {
            None
        };

        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| CollectError::Config("ingestion credentials are not configured".into()))?;

        let response = self
            .uploader
            .upload(role, &record, artifact.as_deref(), credentials)
            .await?;
        result.upload_response = Some(response);

        Ok(())
    }

    /// Soil, a short pause, then environmental. Each half takes the guard on
    /// its own.
    pub async fn collect_all(&self) -> CollectAllResult {
        let soil = self.collect(SensorRole::Soil).await;
        tokio::time::sleep(self.pause).await;
        let environmental = self.collect(SensorRole::Environmental).await;

        CollectAllResult { soil, environmental }
    }

    /// Closes every channel. Safe to call more than once.
    ///
    /// Blocks while an exchange holds a channel; async callers use
    /// [`Collector::close`].
    pub fn shutdown(&self) {
        for link in self.channels.values() {
            if let Some(mut link) = link.lock().unwrap_or_else(PoisonError::into_inner).take() {
                link.close();
            }
        }
    }

    /// [`Collector::shutdown`] on the blocking pool.
    pub async fn close(self: Arc<Self>) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.shutdown()).await {
            tracing::error!("Channel shutdown failed: {}", e);
        }
    }
}

/// One command/answer round trip on the blocking pool.
fn exchange(channel: &SharedLink, role: SensorRole) -> Result<String, CollectError> {
    let mut slot = channel.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(link) = slot.as_mut() else {
        return Err(CollectError::NotConnected(role));
    };

    let line = match link.send(role.command()) {
        Ok(()) => link.receive(),
        Err(e) => return Err(drop_link(&mut slot, role, e.to_string())),
    };

    if !link.is_ok() {
        let message = format!("read from {} failed", link.port());
        return Err(drop_link(&mut slot, role, message));
    }

    if line.is_empty() {
        return Err(CollectError::NoResponse(role));
    }

    Ok(line)
}

fn drop_link(slot: &mut Option<Box<dyn SensorLink>>, role: SensorRole, message: String) -> CollectError {
    if let Some(mut link) = slot.take() {
        link.close();
    }

    CollectError::LinkFault { role, message }
}

fn role_details(role: SensorRole) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("role".into(), json!(role));
    details
}

/// Resolves and opens a link per role. Roles that fail are left out.
pub fn connect_sensors(
    resolver: &dyn PortResolver,
    connector: &dyn Connector,
    sensors: &Sensors,
) -> Vec<(SensorRole, Box<dyn SensorLink>)> {
    let mut links = Vec::new();

    for role in SensorRole::ALL {
        let Some(port) = resolver.resolve(role) else {
            tracing::warn!(%role, "No port resolved");
            continue;
        };

        match connector.open(&port, &LinkSettings::from(sensors.channel(role))) {
            Ok(link) => links.push((role, link)),
            Err(e) => tracing::error!(%role, "{}", e),
        }
    }

    links
}
