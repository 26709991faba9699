use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::embeds::create_report_embed;
use crate::session::report::{Report, Reporter};

/// [`Reporter`] que publica los avisos como embeds en Discord.
///
/// Each report is sent from its own task so the session never waits on the
/// Discord API; send failures only reach the log.
pub struct DiscordReporter {
    http: Arc<Http>,
}

impl DiscordReporter {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl Reporter for DiscordReporter {
    fn report(&self, guild_id: GuildId, channel_id: Option<ChannelId>, report: Report) {
        let Some(channel_id) = channel_id else {
            debug!("📣 [guild {}] Sin canal para el aviso: {}", guild_id, report);
            return;
        };

        let http = self.http.clone();
        tokio::spawn(async move {
            let message = CreateMessage::new().embed(create_report_embed(&report));
            if let Err(e) = channel_id.send_message(&http, message).await {
                warn!("⚠️ [guild {}] No se pudo enviar el aviso a {}: {}", guild_id, channel_id, e);
            }
        });
    }
}
