//! # Bot Module
//!
//! Discord front end of the jukebox.
//!
//! The bot is built around the [`JukeboxBot`] struct which implements
//! Serenity's [`EventHandler`] trait. It owns no playback state itself:
//!
//! - Sessions live in the injected [`SessionRegistry`], one per guild
//! - Queries are resolved through a [`TrackResolver`]
//! - Voice-state updates for the bot user are routed to the guild's session
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use guild_jukebox::{bot::JukeboxBot, config::Config, session::{registry::SessionRegistry, SessionDeps}, sources::TrackResolver};
//! # fn example(config: Config, deps: SessionDeps, resolver: Arc<dyn TrackResolver>) {
//! let registry = SessionRegistry::new();
//! let bot = JukeboxBot::new(config, registry.clone(), deps, resolver);
//! # }
//! ```

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod commands;
pub mod handlers;

use crate::{
    audio::track::Track,
    config::Config,
    error::{SessionError, SessionResult},
    session::{registry::SessionRegistry, ConnectionEvent, Session, SessionDeps},
    sources::TrackResolver,
};

/// Handler de eventos de Discord.
pub struct JukeboxBot {
    config: Arc<Config>,
    registry: SessionRegistry,
    deps: SessionDeps,
    resolver: Arc<dyn TrackResolver>,
}

impl JukeboxBot {
    pub fn new(
        config: Config,
        registry: SessionRegistry,
        deps: SessionDeps,
        resolver: Arc<dyn TrackResolver>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            deps,
            resolver,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &dyn TrackResolver {
        self.resolver.as_ref()
    }

    /// Sesión del guild, creándola (y arrancando su loop) si no existe
    pub fn session(&self, guild_id: GuildId) -> Arc<Session> {
        self.registry.get_or_create(guild_id, |evictor| {
            Session::spawn(guild_id, self.deps.clone(), Some(evictor))
        })
    }

    /// Resuelve `query` y lo encola; devuelve el track y su posición (base 1).
    ///
    /// The session is looked up again once the resolver returns, since it may
    /// have stopped (idle timeout, `/stop`) in the meantime. A replacement
    /// session is connected to `voice_channel` before the track goes in. A
    /// resolution failure leaves every queue untouched.
    pub async fn queue_track(
        &self,
        guild_id: GuildId,
        query: &str,
        requester: UserId,
        text_channel: ChannelId,
        voice_channel: Option<ChannelId>,
    ) -> SessionResult<(Arc<Track>, usize)> {
        let track = Arc::new(self.resolver.resolve(query, requester, text_channel).await?);

        let session = self.session(guild_id);
        if !session.is_connected() {
            let channel_id = voice_channel.ok_or(SessionError::NotConnected)?;
            info!("🔁 [guild {}] Sesión expirada durante la búsqueda, reconectando", guild_id);
            session.bind_text_channel(text_channel);
            session.connect(channel_id).await?;
        }

        let position = session.enqueue(track.clone())?;
        Ok((track, position))
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands are registered per guild when `GUILD_ID` is set (fast
    /// propagation, useful for development) and globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("couldn't register guild commands; check the 'applications.commands' scope")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("couldn't register global commands; check the 'applications.commands' scope")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

/// Traduce un cambio de estado de voz del bot a un evento de conexión
fn connection_event(before: Option<ChannelId>, after: Option<ChannelId>) -> Option<ConnectionEvent> {
    match (before, after) {
        (Some(_), None) => Some(ConnectionEvent::Disconnected { involuntary: true }),
        (before, Some(channel_id)) if before != Some(channel_id) => {
            Some(ConnectionEvent::Moved { channel_id })
        }
        _ => None,
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Routes voice-state changes of the bot user to the guild's session.
    ///
    /// A `/leave` or `/stop` removes the session from the registry before
    /// releasing the connection, so the resulting disconnect finds nothing
    /// to route and is not mistaken for a kick.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let Some(event) = connection_event(old.and_then(|s| s.channel_id), new.channel_id) else {
            return;
        };

        // El gateway repite el canal al conectar; no es un movimiento
        if let ConnectionEvent::Moved { channel_id } = event {
            let known = self.registry.get(guild_id).and_then(|s| s.voice_channel());
            if known.is_none() || known == Some(channel_id) {
                return;
            }
        }

        match self.registry.route_connection_event(guild_id, event).await {
            Some(outcome) => info!("🔌 [guild {}] {:?} → {:?}", guild_id, event, outcome),
            None => debug!("🔌 [guild {}] {:?} sin sesión activa", guild_id, event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ResolutionError,
        session::testing::{deps, track, wait_until, FakeTransport, RecordingReporter, GUILD, TEXT, VOICE},
        sources::MockTrackResolver,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const A: Option<ChannelId> = Some(ChannelId::new(5));
    const B: Option<ChannelId> = Some(ChannelId::new(6));

    #[test]
    fn leaving_a_channel_is_a_disconnect() {
        assert_eq!(
            connection_event(A, None),
            Some(ConnectionEvent::Disconnected { involuntary: true })
        );
    }

    #[test]
    fn changing_channels_is_a_move() {
        assert_eq!(
            connection_event(A, B),
            Some(ConnectionEvent::Moved { channel_id: ChannelId::new(6) })
        );
        assert_eq!(connection_event(None, A), Some(ConnectionEvent::Moved { channel_id: ChannelId::new(5) }));
    }

    #[test]
    fn unchanged_states_are_ignored() {
        assert_eq!(connection_event(A, A), None);
        assert_eq!(connection_event(None, None), None);
    }

    fn bot_with(resolver: Arc<dyn TrackResolver>) -> (JukeboxBot, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::default());
        let deps = deps(transport.clone(), Arc::new(RecordingReporter::default()));
        let bot = JukeboxBot::new(Config::default(), SessionRegistry::new(), deps, resolver);
        (bot, transport)
    }

    fn resolved(query: &str, requester: UserId, channel_id: ChannelId) -> Track {
        Track::new(query, format!("Song {query}"), format!("https://cdn.example/{query}"), requester, channel_id)
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_error_leaves_the_queue_untouched() {
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|query: &str, _: UserId, _: ChannelId| Err(ResolutionError::NotFound(query.to_string())));
        let (bot, transport) = bot_with(Arc::new(resolver));

        let session = bot.session(GUILD);
        session.connect(VOICE).await.unwrap();
        session.enqueue(track("a", 1)).unwrap();
        session.enqueue(track("b", 1)).unwrap();
        let player = transport.player(0);
        wait_until(|| player.play_count() == 1).await;

        let err = bot
            .queue_track(GUILD, "nothing", UserId::new(3), TEXT, Some(VOICE))
            .await
            .unwrap_err();

        assert_eq!(err, SessionError::Resolution(ResolutionError::NotFound("nothing".to_string())));
        assert_eq!(session.queue().len(), 1);
        assert_eq!(session.current().unwrap().id(), "a");
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_track_is_queued_with_its_position() {
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve()
            .withf(|query: &str, requester: &UserId, _: &ChannelId| query == "lofi" && *requester == UserId::new(3))
            .times(2)
            .returning(|query: &str, requester: UserId, channel_id: ChannelId| {
                Ok(resolved(query, requester, channel_id))
            });
        let (bot, transport) = bot_with(Arc::new(resolver));

        let session = bot.session(GUILD);
        session.connect(VOICE).await.unwrap();
        session.enqueue(track("a", 1)).unwrap();
        let player = transport.player(0);
        wait_until(|| player.play_count() == 1).await;

        let (first, position) = bot
            .queue_track(GUILD, "lofi", UserId::new(3), TEXT, Some(VOICE))
            .await
            .unwrap();
        assert_eq!(position, 1);
        assert_eq!(first.requested_by(), UserId::new(3));

        let (_, position) = bot
            .queue_track(GUILD, "lofi", UserId::new(3), TEXT, Some(VOICE))
            .await
            .unwrap();
        assert_eq!(position, 2);
        assert_eq!(transport.connects(), 1);
    }

    /// Resolver que tarda lo indicado antes de responder
    struct SlowResolver(Duration);

    #[async_trait]
    impl TrackResolver for SlowResolver {
        async fn resolve(
            &self,
            query: &str,
            requester: UserId,
            channel_id: ChannelId,
        ) -> Result<Track, ResolutionError> {
            tokio::time::sleep(self.0).await;
            Ok(resolved(query, requester, channel_id))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_expiring_during_resolution_is_replaced() {
        let (bot, transport) = bot_with(Arc::new(SlowResolver(Duration::from_secs(5))));
        let expired = bot.session(GUILD);
        expired.connect(VOICE).await.unwrap();

        // La búsqueda termina después del idle timeout (60 s)
        tokio::time::sleep(Duration::from_secs(58)).await;
        let (track, position) = bot
            .queue_track(GUILD, "late", UserId::new(3), TEXT, Some(VOICE))
            .await
            .unwrap();

        assert!(expired.is_stopped());
        assert_eq!(transport.releases(), 1);
        assert_eq!(position, 1);
        assert_eq!(track.id(), "late");

        let live = bot.registry().get(GUILD).unwrap();
        assert!(!Arc::ptr_eq(&live, &expired));
        assert!(live.is_connected());
        assert_eq!(transport.connects(), 2);
        let player = transport.player(1);
        wait_until(|| player.play_count() == 1).await;
        assert_eq!(player.played_ids(), vec!["late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_without_voice_channel_is_not_connected() {
        let (bot, _transport) = bot_with(Arc::new(SlowResolver(Duration::from_secs(1))));
        let err = bot
            .queue_track(GUILD, "song", UserId::new(3), TEXT, None)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::NotConnected);
    }
}
