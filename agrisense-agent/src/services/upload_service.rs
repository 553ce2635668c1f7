use std::path::Path;
use std::time::Duration;

use agrisense_api::UploadResponse;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::configs::Ingestion;
use crate::errors::UploadError;
use crate::models::{SensorRecord, SensorRole};
use crate::services::is_file;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Ingestion endpoint and its pre-shared key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub api_key: String,
}

impl Credentials {
    /// Fails when either value is blank.
    pub fn from_settings(ingestion: &Ingestion) -> Result<Self, String> {
        let endpoint = ingestion.url.trim();
        let api_key = ingestion.api_key.trim();

        match (endpoint.is_empty(), api_key.is_empty()) {
            (true, _) => Err("ingestion.url is not set".into()),
            (_, true) => Err("ingestion.api_key is not set".into()),
            _ => Ok(Self {
                endpoint: endpoint.to_string(),
                api_key: api_key.to_string(),
            }),
        }
    }
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        role: SensorRole,
        record: &SensorRecord,
        artifact: Option<&Path>,
        credentials: &Credentials,
    ) -> Result<UploadResponse, UploadError>;
}

pub struct HttpUploader {
    http_client: reqwest::Client,
}

impl HttpUploader {
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .unwrap_or_default();

        Self { http_client }
    }

    pub fn from_settings(ingestion: &Ingestion) -> Self {
        Self::new(Duration::from_secs(ingestion.timeout_secs))
    }
}

/// Form fields for one record: `command`, `temp`, `humi`, then the role's own.
pub fn form_fields(role: SensorRole, record: &SensorRecord) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("command", role.command().to_string()),
        ("temp", record.temperature.to_string()),
        ("humi", record.humidity.to_string()),
    ];
    fields.extend(record.fields().into_iter().map(|(name, value)| (name, value.to_string())));
    fields
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(
        &self,
        role: SensorRole,
        record: &SensorRecord,
        artifact: Option<&Path>,
        credentials: &Credentials,
    ) -> Result<UploadResponse, UploadError> {
        let mut form = form_fields(role, record)
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));

        if let Some(path) = artifact {
            if is_file(path).await {
                // read fully so no handle outlives the request
                let bytes = tokio::fs::read(path).await?;
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| "image.jpg".into());

                tracing::debug!("Attach {} ({} bytes)", file_name, bytes.len());
                form = form.part("image", Part::bytes(bytes).file_name(file_name).mime_str("image/jpeg")?);
            } else {
                tracing::warn!("Artifact {} not found, uploading without image", path.display());
            }
        }

        tracing::info!(%role, "Upload to {}", credentials.endpoint);

        let response = self
            .http_client
            .post(&credentials.endpoint)
            .header(API_KEY_HEADER, &credentials.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::status(status.as_u16(), &body));
        }

        Ok(response.json::<UploadResponse>().await?)
    }
}
