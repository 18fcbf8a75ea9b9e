use crate::{error::JobError, media::DownloadError, utils::format_megabytes};

pub const UNSUPPORTED_LINK: &str = "⚠️ I only accept YouTube links.";
pub const FORMAT_PROMPT: &str = "Which format do you want?";
pub const PROCESSING: &str = "Processing your download… ⏳";
pub const UPLOADING: &str = "Uploading file...";
pub const EXPIRED: &str = "This request is no longer valid.";
pub const UNEXPECTED: &str = "⚠️ Something unexpected went wrong while processing your request.";

/// What the status message should say when a job ends with `error`.
pub fn failure_text(error: &JobError) -> String {
    match error {
        JobError::UnsupportedLink => UNSUPPORTED_LINK.to_string(),
        JobError::Expired(_) => EXPIRED.to_string(),
        JobError::TooLarge { size, limit } => format!(
            "❌ The file is too large! It weighs {} MB.\nI can only send files up to {} MB.",
            format_megabytes(*size),
            format_megabytes(*limit)
        ),
        JobError::Download(DownloadError::MissingOutput) => {
            "❌ I couldn't find the downloaded file after processing.".to_string()
        }
        JobError::Download(DownloadError::TimedOut(_)) => {
            "❌ The download took too long and was cancelled.".to_string()
        }
        JobError::Download(e) if e.is_unavailable() => {
            "❌ That video is unavailable or private.".to_string()
        }
        JobError::Download(_) => "❌ The download failed.".to_string(),
        JobError::MalformedChoice(_) | JobError::Io(_) | JobError::Transport(_) => {
            UNEXPECTED.to_string()
        }
    }
}
