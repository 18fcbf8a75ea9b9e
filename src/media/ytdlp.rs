use super::{
    downloader::{DownloadError, Downloader},
    types::{DownloadRequest, DownloadedFile, MediaFormat},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, info, warn};

const AUDIO_FORMAT: &str = "bestaudio/best";
const VIDEO_FORMAT: &str = "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Printed once the final file is in place, after every post-processor ran.
const PRINT_TEMPLATE: &str = "after_move:%(.{title,filepath})j";

pub struct YtDlpDownloader {
    ytdlp_path: PathBuf,
    ffmpeg_path: PathBuf,
    directory: PathBuf,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PrintedFile {
    title: Option<String>,
    filepath: Option<PathBuf>,
}

impl YtDlpDownloader {
    pub fn new(
        ytdlp_path: PathBuf,
        ffmpeg_path: PathBuf,
        directory: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            ytdlp_path,
            ffmpeg_path,
            directory,
            timeout,
        }
    }

    fn format_args(format: MediaFormat) -> &'static [&'static str] {
        match format {
            MediaFormat::Audio => &[
                "--format",
                AUDIO_FORMAT,
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "192K",
            ],
            MediaFormat::Video => &["--format", VIDEO_FORMAT, "--merge-output-format", "mp4"],
        }
    }

    fn build_args(&self, request: &DownloadRequest) -> Vec<OsString> {
        let output_template = self
            .directory
            .join(format!("{}.%(ext)s", request.file_stem));

        let mut args: Vec<OsString> = vec![
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--no-progress".into(),
            "--no-simulate".into(),
            "--print".into(),
            PRINT_TEMPLATE.into(),
            "--ffmpeg-location".into(),
            self.ffmpeg_path.clone().into(),
            "--output".into(),
            output_template.into(),
        ];
        args.extend(Self::format_args(request.format).iter().map(OsString::from));
        args.push(request.url.clone().into());
        args
    }

    fn parse_output(stdout: &str) -> Result<DownloadedFile, DownloadError> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with('{'))
            .ok_or(DownloadError::MissingOutput)?;

        let printed: PrintedFile = serde_json::from_str(line)?;
        let path = printed.filepath.ok_or(DownloadError::MissingOutput)?;

        Ok(DownloadedFile {
            path,
            title: printed
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "Unknown Title".to_string()),
        })
    }

    async fn tool_version(program: &Path, version_flag: &str) -> Option<String> {
        match Command::new(program).arg(version_flag).output().await {
            Ok(output) if output.status.success() => Some(
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("unknown")
                    .trim()
                    .to_string(),
            ),
            Ok(output) => {
                warn!("❌ {} exited with {}", program.display(), output.status);
                None
            }
            Err(e) => {
                warn!("❌ {} not found: {}", program.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadedFile, DownloadError> {
        info!(
            "Downloading {} as {} into {}",
            request.url,
            request.format,
            self.directory.display()
        );

        let args = self.build_args(request);
        debug!("yt-dlp arguments: {:?}", args);

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.ytdlp_path)
                .args(&args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| DownloadError::TimedOut(self.timeout))?
        .map_err(|source| DownloadError::Spawn {
            program: self.ytdlp_path.display().to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DownloadError::Failed {
                status: output.status,
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("yt-dlp output: {}", stdout);

        let file = Self::parse_output(&stdout)?;
        if !tokio::fs::try_exists(&file.path).await.unwrap_or(false) {
            warn!("yt-dlp reported {} but it does not exist", file.path.display());
            return Err(DownloadError::MissingOutput);
        }

        Ok(file)
    }

    async fn test_availability(&self) -> bool {
        let ytdlp_available = match Self::tool_version(&self.ytdlp_path, "--version").await {
            Some(version) => {
                info!("✅ yt-dlp is available, version: {}", version);
                true
            }
            None => false,
        };

        let ffmpeg_available = match Self::tool_version(&self.ffmpeg_path, "-version").await {
            Some(version_line) => {
                info!("✅ ffmpeg is available: {}", version_line);
                true
            }
            None => {
                warn!("ffmpeg is required for mp3 extraction and mp4 merging");
                false
            }
        };

        ytdlp_available && ffmpeg_available
    }
}
