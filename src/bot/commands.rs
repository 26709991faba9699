use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, channel::ChannelType, id::GuildId},
    prelude::Context,
};

/// Todos los comandos slash del bot
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        summon_command(),
        leave_command(),
        play_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        skip_command(),
        queue_command(),
        now_command(),
        shuffle_command(),
        remove_command(),
        loop_command(),
        volume_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Join your voice channel")
}

fn summon_command() -> CreateCommand {
    CreateCommand::new("summon")
        .description("Summon the bot to a voice channel (yours by default)")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Channel, "channel", "Voice channel to join")
                .channel_types(vec![ChannelType::Voice, ChannelType::Stage]),
        )
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Clear the queue and leave the voice channel")
}

// Reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Queue a song by URL or search terms")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "search", "URL or search terms")
                .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause the current song")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume the paused song")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playback, clear the queue and leave")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Vote to skip the current song")
}

// Cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Show the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                .min_int_value(1),
        )
}

fn now_command() -> CreateCommand {
    CreateCommand::new("now").description("Show the song that is playing")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Shuffle the queue")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Remove a song from the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "index", "Position in the queue")
                .min_int_value(1)
                .required(true),
        )
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Loop the current song (toggle)")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Set the player volume")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volume (0-100)")
                .min_int_value(0)
                .max_int_value(100)
                .required(true),
        )
}
