use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body returned by the ingestion endpoint after a successful upload.
///
/// Only `records_created` is interpreted. Everything else is kept as the
/// server sent it, whatever its JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Number of rows the server stored
    pub records_created: i64,
    /// Downstream image analysis task, soil uploads only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_task_id: Option<Value>,
    /// Farm the API key is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm_id: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
