mod choice;
pub mod discord;
mod replies;
mod status;

use crate::config::Config;
use anyhow::Result;

pub async fn run(config: &Config) -> Result<()> {
    discord::run(config).await
}
