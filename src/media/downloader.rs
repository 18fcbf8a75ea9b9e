use super::types::{DownloadRequest, DownloadedFile};
use async_trait::async_trait;
use std::{process::ExitStatus, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("download timed out after {0:?}")]
    TimedOut(Duration),
    #[error("download failed ({status}): {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("download finished but produced no file")]
    MissingOutput,
    #[error("failed to parse downloader output: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl DownloadError {
    /// Whether the remote side reported the media as gone or private.
    pub fn is_unavailable(&self) -> bool {
        match self {
            DownloadError::Failed { stderr, .. } => {
                stderr.contains("Video unavailable")
                    || stderr.contains("Private video")
                    || stderr.contains("This video is not available")
            }
            _ => false,
        }
    }
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Human-readable name of the downloader
    fn name(&self) -> &'static str;

    /// Fetch the media and leave it on disk under the request's file stem
    async fn download(&self, request: &DownloadRequest) -> Result<DownloadedFile, DownloadError>;

    /// Test if this downloader and its helpers are available on the system
    async fn test_availability(&self) -> bool;
}
