mod downloader;
mod types;
mod utils;
mod ytdlp;

pub use downloader::{DownloadError, Downloader};
pub use types::{DownloadRequest, MediaFormat};

use crate::{config::DownloadConfig, error::JobError};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};
use utils::ScratchFiles;
use ytdlp::YtDlpDownloader;

/// URL shapes of the supported video platform.
const SUPPORTED_LINK_PATTERNS: [&str; 3] =
    ["youtube.com/watch?v=", "youtu.be/", "youtube.com/shorts/"];

pub fn is_supported_link(text: &str) -> bool {
    let text = text.trim();
    SUPPORTED_LINK_PATTERNS
        .iter()
        .any(|pattern| text.contains(pattern))
}

/// A downloaded file that passed the size check. The file and any leftovers
/// from producing it are deleted when this is dropped.
#[derive(Debug)]
pub struct PreparedMedia {
    pub title: String,
    pub format: MediaFormat,
    pub path: PathBuf,
    pub size: u64,
    _scratch: ScratchFiles,
}

impl PreparedMedia {
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

pub struct MediaDownloader {
    downloader: Box<dyn Downloader>,
    directory: PathBuf,
    max_upload_bytes: u64,
}

impl MediaDownloader {
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.directory).with_context(|| {
            format!(
                "Failed to create download directory {}",
                config.directory.display()
            )
        })?;

        info!(
            "Media downloader initialized - downloading into {} with a {} byte upload limit",
            config.directory.display(),
            config.max_upload_bytes
        );

        let downloader = YtDlpDownloader::new(
            config.ytdlp_path.clone(),
            config.ffmpeg_path.clone(),
            config.directory.clone(),
            config.timeout(),
        );

        Ok(Self::with_downloader(
            Box::new(downloader),
            config.directory.clone(),
            config.max_upload_bytes,
        ))
    }

    pub fn with_downloader(
        downloader: Box<dyn Downloader>,
        directory: PathBuf,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            downloader,
            directory,
            max_upload_bytes,
        }
    }

    /// Downloads `url` in `format` and checks the result against the upload
    /// limit. Files are written as `<file_stem>.<ext>` and removed again on
    /// every path out of here except a successful return.
    pub async fn fetch(
        &self,
        url: &str,
        format: MediaFormat,
        file_stem: &str,
    ) -> Result<PreparedMedia, JobError> {
        let scratch = ScratchFiles::new(&self.directory, file_stem);
        let request = DownloadRequest {
            url: url.to_string(),
            format,
            file_stem: file_stem.to_string(),
        };

        let file = match self.downloader.download(&request).await {
            Ok(file) => file,
            Err(e) => {
                warn!("{} failed for {}: {}", self.downloader.name(), url, e);
                return Err(e.into());
            }
        };

        let size = tokio::fs::metadata(&file.path).await?.len();
        if size > self.max_upload_bytes {
            warn!(
                "{} is {} bytes, over the {} byte limit",
                file.path.display(),
                size,
                self.max_upload_bytes
            );
            return Err(JobError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        info!(
            "Downloaded \"{}\" with {} ({} bytes)",
            file.title,
            self.downloader.name(),
            size
        );

        Ok(PreparedMedia {
            title: file.title,
            format,
            path: file.path,
            size,
            _scratch: scratch,
        })
    }

    pub async fn test_setup(&self) -> Result<()> {
        info!("Testing media downloader setup...");

        if self.downloader.test_availability().await {
            info!("✅ {} is ready", self.downloader.name());
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "{} is not usable. Please install yt-dlp and ffmpeg or fix their configured paths.",
                self.downloader.name()
            ))
        }
    }
}
