use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::Songbird;
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::player::{Player, SongbirdPlayer},
    error::TransportError,
};

/// Conexión de voz externa.
///
/// Disconnect notifications don't flow through this trait: the gateway
/// delivers them to [`SessionRegistry::route_connection_event`](crate::session::registry::SessionRegistry::route_connection_event).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Joins `channel_id` and returns a player bound to the new connection.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn Player>, TransportError>;

    async fn move_to(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), TransportError>;

    async fn release(&self, guild_id: GuildId) -> Result<(), TransportError>;
}

/// [`Transport`] respaldado por el manager de songbird.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }
}

#[async_trait]
impl Transport for SongbirdTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn Player>, TransportError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(Arc::new(SongbirdPlayer::new(call, self.http.clone())))
    }

    async fn move_to(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), TransportError> {
        // join sobre una llamada existente solo cambia de canal
        self.manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| TransportError::Move(e.to_string()))?;

        info!("🔀 Movido al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    async fn release(&self, guild_id: GuildId) -> Result<(), TransportError> {
        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| TransportError::Release(e.to_string()))?;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }
}
