use super::{
    choice::{format_buttons, FormatChoice},
    replies,
    status::{check_acknowledged, report_failure, StatusChannel, StatusMessage},
};
use crate::{
    config::{Config, DiscordConfig},
    error::JobError,
    media::{is_supported_link, MediaDownloader, MediaFormat},
    pending::PendingStore,
    utils::attachment_name,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use twilight_gateway::{Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt};
use twilight_http::Client as HttpClient;
use twilight_model::{
    application::interaction::{Interaction, InteractionData, InteractionType},
    channel::message::{AllowedMentions, Component},
    gateway::payload::incoming::MessageCreate,
    http::{
        attachment::Attachment,
        interaction::{InteractionResponse, InteractionResponseType},
    },
    id::{marker::ApplicationMarker, Id},
};
use twilight_util::builder::InteractionResponseDataBuilder;

/// Builds the REST client. Titles and links come from users, so no message
/// sent through it may ping anyone.
pub fn http_client(token: String) -> HttpClient {
    // twilight leaves choosing the rustls crypto provider to the application.
    let _ = rustls::crypto::ring::default_provider().install_default();

    HttpClient::builder()
        .token(token)
        .default_allowed_mentions(AllowedMentions::default())
        .build()
}

pub struct DiscordBot {
    shard: Shard,
    context: Arc<BotContext>,
    sweep_interval: std::time::Duration,
}

struct BotContext {
    http: HttpClient,
    application_id: Id<ApplicationMarker>,
    media_downloader: MediaDownloader,
    pending: PendingStore,
    jobs: Semaphore,
    discord: DiscordConfig,
}

impl DiscordBot {
    pub async fn new(token: String, config: &Config) -> Result<Self> {
        let http = http_client(token.clone());

        let intents = Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES | Intents::MESSAGE_CONTENT;
        let shard = Shard::new(ShardId::ONE, token, intents);

        let media_downloader = MediaDownloader::new(&config.download)
            .context("Failed to initialize media downloader")?;

        // Test the media downloader setup
        if let Err(e) = media_downloader.test_setup().await {
            warn!("Media downloader test failed: {}", e);
        }

        // Get application ID
        let application_id = {
            let response = http.current_user_application().await?;
            response.model().await?.id
        };

        let context = BotContext {
            http,
            application_id,
            media_downloader,
            pending: PendingStore::new(config.pending.capacity, config.pending.ttl()),
            jobs: Semaphore::new(config.download.max_concurrent_jobs.max(1)),
            discord: config.discord.clone(),
        };

        Ok(Self {
            shard,
            context: Arc::new(context),
            sweep_interval: config.pending.sweep_interval(),
        })
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Discord bot starting...");

        let sweeper = self.spawn_sweeper();

        loop {
            let event = match self.shard.next_event(EventTypeFlags::all()).await {
                Some(Ok(event)) => event,
                Some(Err(source)) => {
                    error!(?source, "Error receiving event");
                    continue;
                }
                None => {
                    info!("Shard stream ended");
                    sweeper.abort();
                    return Ok(());
                }
            };

            match event {
                Event::MessageCreate(msg) => {
                    let context = Arc::clone(&self.context);
                    tokio::spawn(async move {
                        if let Err(e) = context.handle_message(&msg).await {
                            error!("Failed to handle message {}: {:#}", msg.id, e);
                        }
                    });
                }
                Event::InteractionCreate(interaction) => {
                    let context = Arc::clone(&self.context);
                    tokio::spawn(async move {
                        if let Err(e) = context.handle_interaction(&interaction).await {
                            error!("Failed to handle interaction {}: {:#}", interaction.id, e);
                        }
                    });
                }
                Event::Ready(_) => {
                    info!("Discord bot is ready!");
                }
                _ => {}
            }
        }
    }

    fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let context = Arc::clone(&self.context);
        let period = self.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = context.pending.purge_expired();
                if removed > 0 {
                    debug!(
                        "Dropped {} expired pending request(s), {} left",
                        removed,
                        context.pending.len()
                    );
                }
            }
        })
    }
}

impl BotContext {
    async fn handle_message(&self, msg: &MessageCreate) -> Result<()> {
        // Skip bot messages
        if msg.author.bot {
            return Ok(());
        }

        if msg.guild_id.is_some() && !self.discord.is_listen_channel(&msg.channel_id.to_string())
        {
            return Ok(());
        }

        let link = msg.content.trim();
        if !is_supported_link(link) {
            debug!("Ignoring unsupported link from {}", msg.author.id);
            self.http
                .create_message(msg.channel_id)
                .content(&replies::failure_text(&JobError::UnsupportedLink))
                .reply(msg.id)
                .await?;
            return Ok(());
        }

        if let Err(e) = self.http.delete_message(msg.channel_id, msg.id).await {
            warn!(
                "Could not delete message {} in channel {}: {}",
                msg.id, msg.channel_id, e
            );
        }

        let request_id = self.pending.insert(link);
        info!(
            "Stored pending request {} for {} ({} pending)",
            request_id,
            msg.author.id,
            self.pending.len()
        );

        let components = format_buttons(&request_id);
        self.http
            .create_message(msg.channel_id)
            .content(replies::FORMAT_PROMPT)
            .components(&components)
            .await?;

        Ok(())
    }

    #[allow(clippy::single_match)]
    async fn handle_interaction(&self, interaction: &Interaction) -> Result<()> {
        match interaction.kind {
            InteractionType::MessageComponent => {
                if let Some(InteractionData::MessageComponent(data)) = &interaction.data {
                    self.handle_format_choice(interaction, &data.custom_id)
                        .await?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    async fn handle_format_choice(&self, interaction: &Interaction, custom_id: &str) -> Result<()> {
        let status = match (interaction.channel.as_ref(), interaction.message.as_ref()) {
            (Some(channel), Some(message)) => StatusMessage {
                channel_id: channel.id,
                message_id: message.id,
            },
            _ => {
                error!("No channel or message information in interaction");
                return Ok(());
            }
        };

        let choice = match FormatChoice::parse(custom_id) {
            Ok(choice) => choice,
            Err(e) => {
                warn!("{}", e);
                self.update_prompt(interaction, &replies::failure_text(&e))
                    .await?;
                return Ok(());
            }
        };

        let Some(link) = self.pending.claim(&choice.request_id) else {
            let e = JobError::Expired(choice.request_id);
            info!("{}", e);
            self.update_prompt(interaction, &replies::failure_text(&e))
                .await?;
            return Ok(());
        };

        info!(
            "Request {} claimed as {}: {}",
            choice.request_id, choice.format, link
        );
        let acknowledged = self.update_prompt(interaction, replies::PROCESSING).await;
        if !check_acknowledged(&self.http, status, acknowledged).await {
            return Ok(());
        }

        let _permit = self
            .jobs
            .acquire()
            .await
            .context("Job queue was closed")?;

        if let Err(e) = self.run_job(&link, &choice, status).await {
            error!("Request {} failed: {}", choice.request_id, e);
            report_failure(&self.http, status, &replies::failure_text(&e)).await;
        }

        Ok(())
    }

    async fn run_job(
        &self,
        link: &str,
        choice: &FormatChoice,
        status: StatusMessage,
    ) -> Result<(), JobError> {
        let media = self
            .media_downloader
            .fetch(link, choice.format, choice.request_id.as_str())
            .await?;

        self.http.edit_status(status, replies::UPLOADING).await?;

        let attachment = Attachment::from_bytes(
            attachment_name(&media.title, media.format.extension()),
            media.read().await?,
            0,
        );
        let content = match media.format {
            MediaFormat::Audio => format!("🎵 **{}**", media.title),
            MediaFormat::Video => format!("🎬 **{}**", media.title),
        };

        self.http
            .create_message(status.channel_id)
            .content(&content)
            .attachments(&[attachment])
            .await?;

        info!(
            "Uploaded \"{}\" ({} bytes) for request {}",
            media.title, media.size, choice.request_id
        );

        if let Err(e) = self
            .http
            .delete_message(status.channel_id, status.message_id)
            .await
        {
            warn!("Could not delete status message {}: {}", status.message_id, e);
        }

        Ok(())
    }

    /// Answers a button press by rewriting the prompt it was attached to and
    /// removing its buttons.
    async fn update_prompt(&self, interaction: &Interaction, content: &str) -> Result<()> {
        let response = InteractionResponse {
            kind: InteractionResponseType::UpdateMessage,
            data: Some(
                InteractionResponseDataBuilder::new()
                    .content(content)
                    .components(Vec::<Component>::new())
                    .build(),
            ),
        };

        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &response)
            .await?;

        Ok(())
    }
}

pub async fn run(config: &Config) -> Result<()> {
    let token = config
        .get_discord_token()
        .context("DISCORD_TOKEN environment variable or discord.token config is required")?;

    let bot = DiscordBot::new(token, config).await?;
    bot.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use twilight_http::request::TryIntoRequest;

    #[tokio::test]
    async fn test_http_client_builds() {
        let http = http_client("x".to_string());
        assert!(http.token().is_some());
    }

    #[tokio::test]
    async fn test_messages_do_not_mention() {
        let http = http_client("x".to_string());

        let request = http
            .create_message(Id::new(1))
            .content("🎵 **@everyone FREE**")
            .try_into_request()
            .unwrap();

        let body: serde_json::Value = serde_json::from_slice(request.body().unwrap()).unwrap();
        assert_eq!(body["content"], "🎵 **@everyone FREE**");
        assert_eq!(body["allowed_mentions"]["parse"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_uploads_do_not_mention() {
        let http = http_client("x".to_string());
        let attachment = Attachment::from_bytes("a.mp3".to_string(), vec![0u8; 4], 0);

        let request = http
            .create_message(Id::new(1))
            .content("🎵 **<@&123> FREE**")
            .attachments(&[attachment])
            .try_into_request()
            .unwrap();

        let form = request.form().cloned().unwrap().build();
        let payload = String::from_utf8_lossy(&form);
        assert!(payload.contains(r#""allowed_mentions":{"parse":[]"#));
    }
}
