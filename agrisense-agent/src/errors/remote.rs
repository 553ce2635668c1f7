#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Malformed payload on {topic}: {source}")]
    Payload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected topic {0}")]
    Topic(String),
}
