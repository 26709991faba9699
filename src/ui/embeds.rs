use serenity::{
    all::{Colour, Timestamp},
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{queue::QueuePage, track::Track},
    session::report::Report,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now playing")
        .description(format!("**{}**", track.title()))
        .color(colors::MUSIC_PURPLE)
        .field("🎤 Uploader", track.uploader().unwrap_or("Unknown"), true)
        .field("⏱️ Duration", describe_duration(track.duration()), true)
        .field("👤 Requested by", format!("<@{}>", track.requested_by()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(url) = track.webpage_url() {
        embed = embed.url(url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de confirmación al agregar un track
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Added to the queue")
        .description(track.to_string())
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duration", describe_duration(track.duration()), true)
        .field("📍 Position", position.to_string(), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed.footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea el embed de una página de la cola
pub fn create_queue_embed(
    page: &QueuePage,
    current: Option<&Track>,
    loop_mode: bool,
    queued_duration: Duration,
) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE);

    if let Some(current) = current {
        let status = if loop_mode { "🔂" } else { "▶️" };
        embed = embed.field(format!("{} Playing", status), current.to_string(), false);
    }

    if page.total_items == 0 {
        return embed
            .description("😴 **The queue is empty**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let mut info = format!("**Total:** {} tracks", page.total_items);
    if queued_duration > Duration::ZERO {
        info.push_str(&format!(" • **Duration:** {}", describe_duration(Some(queued_duration))));
    }

    embed = embed
        .description(queue_lines(page))
        .field("Info", info, false);

    embed
        .footer(CreateEmbedFooter::new(page_footer(page)))
        .timestamp(Timestamp::now())
}

/// Embed para los avisos que publica una sesión
pub fn create_report_embed(report: &Report) -> CreateEmbed {
    match report {
        Report::NowPlaying(track) => create_now_playing_embed(track),
        Report::PlaybackFailed { .. } | Report::ReconnectFailed(_) | Report::ReleaseFailed(_) => {
            create_error_embed("Playback error", &report.to_string())
        }
        Report::IdleTimeout => create_info_embed("Disconnected", &report.to_string())
            .color(colors::WARNING_ORANGE),
        Report::Reconnected => create_info_embed("Reconnected", &report.to_string()),
    }
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    simple_embed(format!("❌ {}", title), description, colors::ERROR_RED)
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    simple_embed(format!("ℹ️ {}", title), description, colors::INFO_BLUE)
}

fn simple_embed(title: String, description: &str, color: Colour) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(color)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Líneas numeradas (base 1) de la página
fn queue_lines(page: &QueuePage) -> String {
    page.items
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let duration = track
                .duration()
                .map(|d| format!(" `[{}]`", describe_duration(Some(d))))
                .unwrap_or_default();
            format!("**{}**. {}{}\n", page.first_index + i + 1, track, duration)
        })
        .collect()
}

fn page_footer(page: &QueuePage) -> String {
    format!("Page {} of {} • {}", page.current_page, page.total_pages, STANDARD_FOOTER)
}

/// Duración legible ("3m 35s"); sin duración se asume un stream en vivo
pub fn describe_duration(duration: Option<Duration>) -> String {
    match duration {
        Some(duration) => {
            humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
        }
        None => "🔴 Live".to_string(),
    }
}
