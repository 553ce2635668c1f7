use std::time::Duration;

use agrisense_api::{RemoteCommand, ScheduleData, Status, StatusMessage};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use serde_json::{Map, Value};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use crate::configs::Settings;
use crate::errors::{AppError, RemoteError};
use crate::services::StatusReporter;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub command: String,
    pub schedule: String,
    pub status: String,
}

impl Topics {
    pub fn new(farm_id: &str, organization_id: &str) -> Self {
        Self {
            command: format!("farm/{farm_id}/command"),
            schedule: format!("organization/{organization_id}/settings/schedule"),
            status: format!("farm/{farm_id}/status"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Command(RemoteCommand),
    Schedule(ScheduleData),
}

pub fn decode(topics: &Topics, topic: &str, payload: &[u8]) -> Result<RemoteEvent, RemoteError> {
    let invalid = |source| RemoteError::Payload {
        topic: topic.to_string(),
        source,
    };

    if topic == topics.command {
        Ok(RemoteEvent::Command(serde_json::from_slice(payload).map_err(invalid)?))
    } else if topic == topics.schedule {
        Ok(RemoteEvent::Schedule(serde_json::from_slice(payload).map_err(invalid)?))
    } else {
        Err(RemoteError::Topic(topic.to_string()))
    }
}

/// Broker connection for remote commands, schedule pushes and status.
pub struct RemoteService {
    client: AsyncClient,
    topics: Topics,
    farm_id: String,
}

impl RemoteService {
    pub fn new(settings: &Settings) -> Result<(Self, EventLoop), AppError> {
        let remote = settings.remote.as_ref().ok_or(AppError::MissingRemote)?;
        let topics = Topics::new(&settings.agent.farm_id, &settings.agent.organization_id);

        let mut options = MqttOptions::new(settings.client_id(), &remote.host, remote.port);
        options.set_keep_alive(Duration::from_secs(remote.keep_alive_secs.max(5)));

        if let Some(auth) = &remote.auth {
            options.set_credentials(&auth.username, &auth.password);
        }

        let will = StatusMessage::new(Status::Offline, &settings.agent.farm_id, None);
        if let Ok(payload) = serde_json::to_vec(&will) {
            options.set_last_will(LastWill::new(&topics.status, payload, QoS::AtLeastOnce, false));
        }

        let (client, event_loop) = AsyncClient::new(options, 10);

        tracing::info!("MQTT client {} for {}:{}", settings.client_id(), remote.host, remote.port);

        Ok((
            Self {
                client,
                topics,
                farm_id: settings.agent.farm_id.clone(),
            },
            event_loop,
        ))
    }

    /// Polls the broker connection and forwards decoded messages to `sender`.
    /// Subscriptions are renewed on every (re)connect.
    pub fn spawn(&self, mut event_loop: EventLoop, sender: Sender<RemoteEvent>) -> JoinHandle<()> {
        let client = self.client.clone();
        let topics = self.topics.clone();

        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("Connected to broker");
                        for topic in [&topics.command, &topics.schedule] {
                            match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                                Ok(()) => tracing::debug!("subscribe topic {}", topic),
                                Err(e) => tracing::error!("Subscribe to {} failed: {}", topic, e),
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match decode(&topics, &publish.topic, &publish.payload) {
                            Ok(event) => {
                                tracing::debug!("Receive: {:?}", event);
                                if sender.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!("{}", e),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("MQTT error: {}", e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        })
    }

    pub async fn disconnect(&self) -> Result<(), RemoteError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

impl StatusReporter for RemoteService {
    fn report(&self, status: Status, details: Option<Map<String, Value>>) {
        let message = StatusMessage::new(status, &self.farm_id, details);

        let payload = match serde_json::to_vec(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Status {} not encoded: {}", status, e);
                return;
            }
        };

        if let Err(e) = self
            .client
            .try_publish(&self.topics.status, QoS::AtLeastOnce, false, payload)
        {
            tracing::warn!("Status {} not published: {}", status, e);
        }
    }
}
