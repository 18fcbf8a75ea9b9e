use super::replies;
use crate::error::JobError;
use async_trait::async_trait;
use tracing::{error, warn};
use twilight_http::Client as HttpClient;
use twilight_model::id::{
    marker::{ChannelMarker, MessageMarker},
    Id,
};

/// The prompt message, which becomes the status message once a format is
/// picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    pub channel_id: Id<ChannelMarker>,
    pub message_id: Id<MessageMarker>,
}

#[async_trait]
pub trait StatusChannel: Send + Sync {
    /// Replace the text of the status message
    async fn edit_status(&self, status: StatusMessage, content: &str) -> Result<(), JobError>;

    /// Post a fresh message in the channel
    async fn send_message(
        &self,
        channel_id: Id<ChannelMarker>,
        content: &str,
    ) -> Result<(), JobError>;
}

#[async_trait]
impl StatusChannel for HttpClient {
    async fn edit_status(&self, status: StatusMessage, content: &str) -> Result<(), JobError> {
        self.update_message(status.channel_id, status.message_id)
            .content(Some(content))
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: Id<ChannelMarker>,
        content: &str,
    ) -> Result<(), JobError> {
        self.create_message(channel_id).content(content).await?;
        Ok(())
    }
}

/// Shows `content` in the status message, or in a new message when the
/// status message can no longer be edited.
pub async fn report_failure(chat: &dyn StatusChannel, status: StatusMessage, content: &str) {
    let Err(edit_error) = chat.edit_status(status, content).await else {
        return;
    };

    warn!(
        "Failed to edit status message {}, sending a new one: {}",
        status.message_id, edit_error
    );
    if let Err(e) = chat.send_message(status.channel_id, content).await {
        error!("Failed to report failure in {}: {}", status.channel_id, e);
    }
}

/// A claimed request must end with the user seeing something. When the
/// processing notice could not be shown, report the failure instead and
/// return `false` so the job is not started.
pub async fn check_acknowledged(
    chat: &dyn StatusChannel,
    status: StatusMessage,
    acknowledged: anyhow::Result<()>,
) -> bool {
    match acknowledged {
        Ok(()) => true,
        Err(e) => {
            error!(
                "Failed to acknowledge format choice on {}: {:#}",
                status.message_id, e
            );
            report_failure(chat, status, replies::UNEXPECTED).await;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        fail_edits: bool,
        fail_sends: bool,
        edits: Mutex<Vec<String>>,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StatusChannel for RecordingChannel {
        async fn edit_status(
            &self,
            _status: StatusMessage,
            content: &str,
        ) -> Result<(), JobError> {
            if self.fail_edits {
                return Err(JobError::Io(std::io::Error::other("message too old")));
            }
            self.edits.lock().unwrap().push(content.to_string());
            Ok(())
        }

        async fn send_message(
            &self,
            _channel_id: Id<ChannelMarker>,
            content: &str,
        ) -> Result<(), JobError> {
            if self.fail_sends {
                return Err(JobError::Io(std::io::Error::other("channel gone")));
            }
            self.sent.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }

    fn status() -> StatusMessage {
        StatusMessage {
            channel_id: Id::new(10),
            message_id: Id::new(20),
        }
    }

    #[tokio::test]
    async fn test_failure_edits_status() {
        let chat = RecordingChannel::default();

        report_failure(&chat, status(), "❌ The download failed.").await;

        assert_eq!(*chat.edits.lock().unwrap(), vec!["❌ The download failed."]);
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_new_message() {
        let chat = RecordingChannel {
            fail_edits: true,
            ..Default::default()
        };

        report_failure(&chat, status(), "❌ The download failed.").await;

        assert!(chat.edits.lock().unwrap().is_empty());
        assert_eq!(*chat.sent.lock().unwrap(), vec!["❌ The download failed."]);
    }

    #[tokio::test]
    async fn test_failure_when_both_paths_fail_does_not_panic() {
        let chat = RecordingChannel {
            fail_edits: true,
            fail_sends: true,
            ..Default::default()
        };

        report_failure(&chat, status(), "❌ The download failed.").await;

        assert!(chat.edits.lock().unwrap().is_empty());
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acknowledged_claim_starts_job() {
        let chat = RecordingChannel::default();

        assert!(check_acknowledged(&chat, status(), Ok(())).await);
        assert!(chat.edits.lock().unwrap().is_empty());
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unacknowledged_claim_reports_failure() {
        let chat = RecordingChannel::default();

        let started = check_acknowledged(
            &chat,
            status(),
            Err(anyhow::anyhow!("interaction token expired")),
        )
        .await;

        assert!(!started);
        assert_eq!(*chat.edits.lock().unwrap(), vec![replies::UNEXPECTED]);
    }

    #[tokio::test]
    async fn test_unacknowledged_claim_falls_back_to_new_message() {
        let chat = RecordingChannel {
            fail_edits: true,
            ..Default::default()
        };

        let started = check_acknowledged(
            &chat,
            status(),
            Err(anyhow::anyhow!("interaction token expired")),
        )
        .await;

        assert!(!started);
        assert_eq!(*chat.sent.lock().unwrap(), vec![replies::UNEXPECTED]);
    }
}
