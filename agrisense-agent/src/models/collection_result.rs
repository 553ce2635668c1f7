use std::path::PathBuf;

use agrisense_api::UploadResponse;

use crate::errors::{CollectError, ErrorKind};
use crate::models::{SensorRecord, SensorRole};

/// Outcome of one acquire, parse, artifact, upload cycle.
///
/// Filled in step by step, so a failed cycle still carries whatever it got
/// before the failure.
#[derive(Debug)]
pub struct CollectionResult {
    pub role: SensorRole,
    pub success: bool,
    pub record: Option<SensorRecord>,
    pub artifact_path: Option<PathBuf>,
    pub upload_response: Option<UploadResponse>,
    pub error: Option<CollectError>,
}

impl CollectionResult {
    pub fn new(role: SensorRole) -> Self {
        Self {
            role,
            success: false,
            record: None,
            artifact_path: None,
            upload_response: None,
            error: None,
        }
    }

    pub fn failed(role: SensorRole, error: CollectError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(role)
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(CollectError::kind)
    }

    /// The sensor line behind this result, also available when parsing failed.
    pub fn raw_line(&self) -> Option<&str> {
        match (&self.record, &self.error) {
            (Some(record), _) => Some(&record.raw_line),
            (None, Some(CollectError::Parse(e))) => Some(&e.raw_line),
            _ => None,
        }
    }
}

/// Outcome of a soil then environmental run.
#[derive(Debug)]
pub struct CollectAllResult {
    pub soil: CollectionResult,
    pub environmental: CollectionResult,
}

impl CollectAllResult {
    /// Partial data beats no data: either role succeeding is enough.
    pub fn success(&self) -> bool {
        self.soil.success || self.environmental.success
    }
}
