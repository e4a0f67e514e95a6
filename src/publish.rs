//! Artifact publishing
//!
//! Delivery of a finished report (object storage, email, ...) sits behind
//! [`ArtifactPublisher`]. The filesystem publisher is the local default.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::report::ReportArtifact;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("destination rejected the artifact: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Deliver the artifact; returns where it ended up
    async fn publish(
        &self,
        artifact: &ReportArtifact,
        destination: &str,
    ) -> Result<String, PublishError>;
}

/// Writes `{name}.{ext}` into a destination directory
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPublisher;

#[async_trait]
impl ArtifactPublisher for FsPublisher {
    async fn publish(
        &self,
        artifact: &ReportArtifact,
        destination: &str,
    ) -> Result<String, PublishError> {
        let file_name = artifact.file_name();
        if file_name.contains(['/', '\\']) {
            return Err(PublishError::Rejected(format!(
                "report name '{}' is not a valid file name",
                artifact.name()
            )));
        }

        let dir = PathBuf::from(destination);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| PublishError::Io {
                path: dir.clone(),
                source,
            })?;

        let path = dir.join(file_name);
        tokio::fs::write(&path, artifact.content())
            .await
            .map_err(|source| PublishError::Io {
                path: path.clone(),
                source,
            })?;

        info!(
            "Published {} ({} bytes) to {}",
            artifact.name(),
            artifact.content().len(),
            path.display()
        );
        Ok(path.display().to_string())
    }
}
