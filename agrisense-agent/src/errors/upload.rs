use std::io;

/// Longest response body kept in an upload error.
pub const BODY_EXCERPT_LEN: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Upload failed: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to read artifact for upload: {0}")]
    Io(#[from] io::Error),
}

impl UploadError {
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: body.chars().take(BODY_EXCERPT_LEN).collect(),
        }
    }
}
