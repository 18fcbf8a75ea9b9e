use crate::{media::DownloadError, pending::RequestId};

/// Everything that can end a request before its file reaches the chat.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("message does not contain a supported link")]
    UnsupportedLink,
    #[error("malformed format choice: {0:?}")]
    MalformedChoice(String),
    #[error("request {0} was already claimed or has expired")]
    Expired(RequestId),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("file is {size} bytes, over the {limit} byte upload limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("failed to read downloaded file: {0}")]
    Io(#[from] std::io::Error),
    #[error("discord request failed: {0}")]
    Transport(#[from] twilight_http::Error),
}
