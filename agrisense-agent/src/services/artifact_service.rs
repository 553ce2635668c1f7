use std::path::{Path, PathBuf};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::fs;
use tokio::process::Command;

use crate::configs::Artifact;
use crate::errors::ArtifactError;

/// Supplies the photo attached to a soil upload.
#[async_trait]
pub trait ArtifactProvider: Send + Sync {
    /// Produces a file named `filename` and returns where it was written.
    async fn get_artifact(&self, filename: &str) -> Result<PathBuf, ArtifactError>;
}

/// `farm_{unix_seconds}.jpg`
pub fn artifact_filename(at: OffsetDateTime) -> String {
    format!("farm_{}.jpg", at.unix_timestamp())
}

pub fn create_provider(artifact: &Artifact) -> Box<dyn ArtifactProvider> {
    match artifact {
        Artifact::Canned { source, directory } => Box::new(CannedArtifact {
            source: PathBuf::from(source),
            directory: PathBuf::from(directory),
        }),
        Artifact::Capture { program, args, directory } => Box::new(CaptureArtifact {
            program: program.clone(),
            args: args.clone(),
            directory: PathBuf::from(directory),
        }),
    }
}

/// Copies one fixed image for every cycle, for rigs without a camera.
pub struct CannedArtifact {
    pub source: PathBuf,
    pub directory: PathBuf,
}

#[async_trait]
impl ArtifactProvider for CannedArtifact {
    async fn get_artifact(&self, filename: &str) -> Result<PathBuf, ArtifactError> {
        if !fs::try_exists(&self.source).await? {
            return Err(ArtifactError::SourceNotFound(self.source.clone()));
        }

        fs::create_dir_all(&self.directory).await?;
        let target = self.directory.join(filename);
        fs::copy(&self.source, &target).await?;

        tracing::debug!("Copied {} to {}", self.source.display(), target.display());

        ensure_exists(target).await
    }
}

/// Runs an external capture program. Every `{path}` in the arguments is
/// replaced by the output file.
pub struct CaptureArtifact {
    pub program: String,
    pub args: Vec<String>,
    pub directory: PathBuf,
}

#[async_trait]
impl ArtifactProvider for CaptureArtifact {
    async fn get_artifact(&self, filename: &str) -> Result<PathBuf, ArtifactError> {
        fs::create_dir_all(&self.directory).await?;
        let target = self.directory.join(filename);
        let target_str = target.to_string_lossy();

        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{path}", &target_str))
            .collect();

        tracing::debug!("Capture: {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ArtifactError::Capture {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ArtifactError::Capture {
                program: self.program.clone(),
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        ensure_exists(target).await
    }
}

async fn ensure_exists(path: PathBuf) -> Result<PathBuf, ArtifactError> {
    if is_file(&path).await {
        Ok(path)
    } else {
        Err(ArtifactError::Missing(path))
    }
}

pub async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
