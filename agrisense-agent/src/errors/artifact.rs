use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Artifact not found after acquisition: {0}")]
    Missing(PathBuf),

    #[error("Capture command `{program}` failed: {message}")]
    Capture { program: String, message: String },

    #[error("Artifact I/O error: {0}")]
    Io(#[from] io::Error),
}
