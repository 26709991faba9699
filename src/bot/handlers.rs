use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandDataOptionValue, CommandInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    bot::JukeboxBot,
    error::SessionError,
    session::{ConnectOutcome, Session, SkipOutcome},
    ui::embeds,
};

/// Respuesta única de un comando
enum Reply {
    Embed(CreateEmbed),
    Text(String),
    /// Error visible solo para quien ejecutó el comando
    Error(String),
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    fn error(text: impl Into<String>) -> Self {
        Reply::Error(text.into())
    }

    fn message(self) -> CreateInteractionResponseMessage {
        match self {
            Reply::Embed(embed) => CreateInteractionResponseMessage::new().embed(embed),
            Reply::Text(text) => CreateInteractionResponseMessage::new().content(text),
            Reply::Error(text) => CreateInteractionResponseMessage::new()
                .embed(embeds::create_error_embed("Error", &text))
                .ephemeral(true),
        }
    }

    fn edit(self) -> EditInteractionResponse {
        match self {
            Reply::Embed(embed) => EditInteractionResponse::new().embed(embed),
            Reply::Text(text) => EditInteractionResponse::new().content(text),
            Reply::Error(text) => {
                EditInteractionResponse::new().embed(embeds::create_error_embed("Error", &text))
            }
        }
    }
}

impl From<SessionError> for Reply {
    fn from(error: SessionError) -> Self {
        Reply::Error(describe_error(&error))
    }
}

/// Maneja comandos slash.
///
/// Every command ends in exactly one response: either an immediate message
/// or, for `/play`, a deferred response that is edited once.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(ctx, &command, Reply::error("This command only works in a server.")).await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    if command.data.name == "play" {
        return handle_play(ctx, &command, bot, guild_id).await;
    }

    let reply = match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, bot, guild_id, None).await,
        "summon" => {
            let target = channel_option(&command, "channel");
            handle_join(ctx, &command, bot, guild_id, target).await
        }
        "leave" | "stop" => handle_stop(bot, guild_id).await,
        "pause" => match bot.registry().get(guild_id) {
            Some(session) => session
                .pause()
                .await
                .map_or_else(Reply::from, |_| Reply::text("⏸️ Paused")),
            None => SessionError::NotConnected.into(),
        },
        "resume" => match bot.registry().get(guild_id) {
            Some(session) => session
                .resume()
                .await
                .map_or_else(Reply::from, |_| Reply::text("▶️ Resumed")),
            None => SessionError::NotConnected.into(),
        },
        "skip" => handle_skip(bot, guild_id, command.user.id).await,
        "queue" => handle_queue(&command, bot, guild_id),
        "now" => handle_now(bot, guild_id),
        "shuffle" => with_session(bot, guild_id, |session| {
            session.shuffle();
            Reply::text("🔀 Queue shuffled")
        }),
        "remove" => handle_remove(&command, bot, guild_id),
        "loop" => with_session(bot, guild_id, |session| match session.toggle_loop() {
            Ok(true) => Reply::text("🔂 Looping the current song"),
            Ok(false) => Reply::text("➡️ Loop disabled"),
            Err(e) => e.into(),
        }),
        "volume" => handle_volume(&command, bot, guild_id).await,
        other => {
            warn!("Comando desconocido: {}", other);
            Reply::error("Unknown command.")
        }
    };

    respond(ctx, &command, reply).await
}

async fn respond(ctx: &Context, command: &CommandInteraction, reply: Reply) -> Result<()> {
    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(reply.message()))
        .await?;
    Ok(())
}

fn with_session(bot: &JukeboxBot, guild_id: GuildId, f: impl FnOnce(&Session) -> Reply) -> Reply {
    match bot.registry().get(guild_id) {
        Some(session) => f(&session),
        None => SessionError::NotConnected.into(),
    }
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(query) = string_option(command, "search") else {
        return respond(ctx, command, Reply::error("Tell me what to play.")).await;
    };

    // El usuario debe estar en un canal de voz si el bot todavía no lo está
    let session = bot.session(guild_id);
    if !session.is_connected() {
        let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
            return respond(ctx, command, Reply::error("You are not connected to a voice channel.")).await;
        };
        session.bind_text_channel(command.channel_id);
        if let Err(e) = session.connect(channel_id).await {
            return respond(ctx, command, e.into()).await;
        }
    }
    let voice_channel = session.voice_channel();

    // Defer la respuesta ya que resolver puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let reply = match bot
        .queue_track(guild_id, &query, command.user.id, command.channel_id, voice_channel)
        .await
    {
        Ok((track, position)) => Reply::Embed(embeds::create_track_added_embed(&track, position)),
        Err(SessionError::Resolution(e)) => {
            warn!("❌ [guild {}] No se pudo resolver {}: {}", guild_id, query, e);
            Reply::error(e.to_string())
        }
        Err(e) => e.into(),
    };

    command.edit_response(&ctx.http, reply.edit()).await?;
    Ok(())
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
    target: Option<ChannelId>,
) -> Reply {
    let Some(channel_id) = target.or_else(|| user_voice_channel(ctx, guild_id, command.user.id)) else {
        return Reply::error("You are not connected to a voice channel.");
    };

    let session = bot.session(guild_id);
    session.bind_text_channel(command.channel_id);
    match session.connect(channel_id).await {
        Ok(ConnectOutcome::Joined) => Reply::text(format!("🔊 Joined <#{}>", channel_id)),
        Ok(ConnectOutcome::Moved) => Reply::text(format!("🔀 Moved to <#{}>", channel_id)),
        Ok(ConnectOutcome::AlreadyConnected) => {
            Reply::text(format!("Already connected to <#{}>", channel_id))
        }
        Err(e) => e.into(),
    }
}

async fn handle_stop(bot: &JukeboxBot, guild_id: GuildId) -> Reply {
    // Primero fuera del registro: la desconexión resultante no se reenruta
    match bot.registry().remove(guild_id) {
        Some(session) => {
            session.shutdown().await;
            Reply::text("⏹️ Stopped and left the voice channel")
        }
        None => SessionError::NotConnected.into(),
    }
}

async fn handle_skip(bot: &JukeboxBot, guild_id: GuildId, voter: UserId) -> Reply {
    let Some(session) = bot.registry().get(guild_id) else {
        return SessionError::NotPlaying.into();
    };

    match session.vote_skip(voter).await {
        Ok(outcome) => Reply::text(describe_skip(outcome)),
        Err(e) => e.into(),
    }
}

fn handle_queue(command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Reply {
    let page = integer_option(command, "page").unwrap_or(1).max(1) as usize;
    with_session(bot, guild_id, |session| {
        let view = session.queue().page(page, bot.config().queue_page_size);
        let current = session.current();
        Reply::Embed(embeds::create_queue_embed(
            &view,
            current.as_deref(),
            session.loop_mode(),
            session.queue().total_duration(),
        ))
    })
}

fn handle_now(bot: &JukeboxBot, guild_id: GuildId) -> Reply {
    match bot.registry().get(guild_id).and_then(|s| s.current()) {
        Some(track) => Reply::Embed(embeds::create_now_playing_embed(&track)),
        None => Reply::error("Not playing any music right now."),
    }
}

fn handle_remove(command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Reply {
    let Some(index) = integer_option(command, "index") else {
        return Reply::error("Tell me which position to remove.");
    };

    with_session(bot, guild_id, |session| {
        let Some(position) = to_queue_index(index) else {
            return Reply::error(format!("Invalid position {}: positions start at 1", index));
        };
        match session.remove(position) {
            Ok(track) => Reply::text(format!("❌ Removed {}", track)),
            Err(e) => e.into(),
        }
    })
}

async fn handle_volume(command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Reply {
    let Some(level) = integer_option(command, "level") else {
        return Reply::error("Tell me the volume (0-100).");
    };
    let Some(session) = bot.registry().get(guild_id) else {
        return SessionError::NotConnected.into();
    };

    match session.set_volume(level).await {
        Ok(_) => Reply::text(format!("🔊 Volume set to {}%", level)),
        Err(e) => e.into(),
    }
}

// Opciones y estado de Discord

fn option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a CommandDataOptionValue> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .map(|opt| &opt.value)
}

fn string_option(command: &CommandInteraction, name: &str) -> Option<String> {
    option(command, name)
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    option(command, name).and_then(|value| value.as_i64())
}

fn channel_option(command: &CommandInteraction, name: &str) -> Option<ChannelId> {
    option(command, name).and_then(|value| value.as_channel_id())
}

/// Canal de voz del usuario según la caché del gateway
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild.voice_states.get(&user_id).and_then(|state| state.channel_id)
}

/// Convierte una posición de usuario (base 1) en índice de cola (base 0)
fn to_queue_index(position: i64) -> Option<usize> {
    usize::try_from(position).ok()?.checked_sub(1)
}

/// Mensaje de error para el usuario; los índices se muestran en base 1
fn describe_error(error: &SessionError) -> String {
    match error {
        SessionError::InvalidIndex { index, len } if *len == 0 => {
            format!("Invalid position {}: the queue is empty", index + 1)
        }
        SessionError::InvalidIndex { index, len } => {
            format!("Invalid position {}: pick a number between 1 and {}", index + 1, len)
        }
        other => other.to_string(),
    }
}

fn describe_skip(outcome: SkipOutcome) -> String {
    match outcome {
        SkipOutcome::RequesterSkipped => "⏭️ Requester requested skipping the song.".to_string(),
        SkipOutcome::VoteAdded { votes, required } => {
            format!("🗳️ Skip vote added, currently at **{}/{}**", votes, required)
        }
        SkipOutcome::AlreadyVoted { votes, required } => {
            format!("You have already voted to skip this song. (**{}/{}**)", votes, required)
        }
        SkipOutcome::Skipped { votes, required } => {
            format!("⏭️ Skip vote passed (**{}/{}**), skipping the song.", votes, required)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn positions_are_one_based() {
        assert_eq!(to_queue_index(1), Some(0));
        assert_eq!(to_queue_index(3), Some(2));
        assert_eq!(to_queue_index(0), None);
        assert_eq!(to_queue_index(-4), None);
    }

    #[test]
    fn invalid_index_errors_use_user_positions() {
        let error = SessionError::InvalidIndex { index: 4, len: 2 };
        assert_eq!(describe_error(&error), "Invalid position 5: pick a number between 1 and 2");

        let error = SessionError::InvalidIndex { index: 0, len: 0 };
        assert_eq!(describe_error(&error), "Invalid position 1: the queue is empty");

        assert_eq!(describe_error(&SessionError::NotPlaying), "Nothing being played at the moment.");
    }

    #[test]
    fn skip_messages_show_the_vote_count() {
        assert_eq!(
            describe_skip(SkipOutcome::VoteAdded { votes: 1, required: 3 }),
            "🗳️ Skip vote added, currently at **1/3**"
        );
        assert!(describe_skip(SkipOutcome::RequesterSkipped).contains("Requester"));
    }
}
