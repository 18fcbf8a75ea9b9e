use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::PathBuf, time::Duration};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub discord: DiscordConfig,
    pub download: DownloadConfig,
    pub pending: PendingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: Option<String>,
    /// Guild channels the bot listens in. Empty means every channel it can
    /// read; direct messages are always handled.
    pub channels: HashSet<String>,
}

impl DiscordConfig {
    pub fn is_listen_channel(&self, channel_id: &str) -> bool {
        self.channels.is_empty() || self.channels.contains(channel_id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    pub directory: PathBuf,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub timeout_secs: u64,
    pub max_upload_bytes: u64,
    pub max_concurrent_jobs: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/tmp/downloads"),
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: PathBuf::from("/usr/bin/ffmpeg"),
            timeout_secs: 600,
            // Discord's upload limit for servers without boosts
            max_upload_bytes: 25_000_000,
            max_concurrent_jobs: 2,
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PendingConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_secs: 900,
            sweep_interval_secs: 60,
        }
    }
}

impl PendingConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse config")
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }

    /// `DISCORD_TOKEN` takes precedence over the token stored in the file.
    pub fn get_discord_token(&self) -> Option<String> {
        std::env::var("DISCORD_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| self.discord.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.discord.token.is_none());
        assert!(config.discord.channels.is_empty());
        assert_eq!(config.download.directory, PathBuf::from("/tmp/downloads"));
        assert_eq!(config.download.max_upload_bytes, 25_000_000);
        assert_eq!(config.download.max_concurrent_jobs, 2);
        assert_eq!(config.pending.capacity, 1024);
        assert_eq!(config.pending.ttl(), Duration::from_secs(900));
        assert_eq!(config.get_logging_format(), "json");
    }

    #[test]
    fn test_partial_config_overrides() {
        let config = Config::from_toml(
            r#"
            [discord]
            token = "abc"
            channels = ["123", "456"]

            [download]
            directory = "/var/cache/tubegrab"
            max_upload_bytes = 50000000

            [logging]
            format = "pretty"
            "#,
        )
        .unwrap();

        assert_eq!(config.discord.token.as_deref(), Some("abc"));
        assert_eq!(config.discord.channels.len(), 2);
        assert_eq!(
            config.download.directory,
            PathBuf::from("/var/cache/tubegrab")
        );
        assert_eq!(config.download.max_upload_bytes, 50_000_000);
        assert_eq!(config.download.ytdlp_path, PathBuf::from("yt-dlp"));
        assert_eq!(config.download.timeout(), Duration::from_secs(600));
        assert_eq!(config.get_logging_format(), "pretty");
    }

    #[test]
    fn test_listen_channels() {
        let mut discord = DiscordConfig::default();
        assert!(discord.is_listen_channel("123"));

        discord.channels.insert("123".to_string());
        assert!(discord.is_listen_channel("123"));
        assert!(!discord.is_listen_channel("456"));
    }

    #[test]
    fn test_sweep_interval_never_zero() {
        let config = Config::from_toml("[pending]\nsweep_interval_secs = 0").unwrap();
        assert_eq!(config.pending.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(Config::from_toml("[download]\ntimeout_secs = \"soon\"").is_err());
    }
}
