use std::{fmt, path::PathBuf, str::FromStr};

/// The two output formats offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Audio,
    Video,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 2] = [MediaFormat::Audio, MediaFormat::Video];

    pub fn tag(self) -> &'static str {
        match self {
            MediaFormat::Audio => "mp3",
            MediaFormat::Video => "mp4",
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            MediaFormat::Audio => "🎵 Mp3",
            MediaFormat::Video => "🎬 Mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        self.tag()
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for MediaFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp3" => Ok(MediaFormat::Audio),
            "mp4" => Ok(MediaFormat::Video),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub format: MediaFormat,
    /// Stem of every file the download produces.
    pub file_stem: String,
}

#[derive(Debug)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub title: String,
}
