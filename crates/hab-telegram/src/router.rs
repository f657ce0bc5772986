use std::{sync::Arc, time::Duration};

use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;

use hab_core::{
    config::Config,
    orchestrator::AlarmBot,
    poller::{Poller, UpdateSource},
};

use crate::TelegramUpdates;

/// Headroom on top of the long-poll timeout so the HTTP client never aborts a healthy poll.
const CLIENT_TIMEOUT_HEADROOM: Duration = Duration::from_secs(15);

/// Build the teloxide bot with an HTTP client that tolerates long polls.
pub fn build_bot(cfg: &Config) -> anyhow::Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(cfg.poll_timeout + CLIENT_TIMEOUT_HEADROOM)
        .build()?;
    Ok(Bot::with_client(cfg.bot_token.clone(), client))
}

/// Run the inbound polling task until `cancel` fires.
pub async fn run_polling(
    bot: Bot,
    alarm: Arc<AlarmBot>,
    cfg: Arc<Config>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    // Basic startup info.
    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "telegram bot started"),
        Err(e) => tracing::warn!("getMe failed (continuing): {e}"),
    }

    let source: Arc<dyn UpdateSource> = Arc::new(TelegramUpdates::new(bot));
    Poller::new(source, alarm, cfg.poller()).run(cancel).await;

    Ok(())
}
