use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, sync::Arc};

use crate::{
    audio::track::Track,
    error::{PlaybackError, TransportError},
};

/// Mensajes que una sesión publica por su cuenta (fuera de una respuesta a comando).
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    NowPlaying(Arc<Track>),
    PlaybackFailed {
        track: Arc<Track>,
        error: PlaybackError,
    },
    IdleTimeout,
    Reconnected,
    ReconnectFailed(TransportError),
    ReleaseFailed(TransportError),
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::NowPlaying(track) => write!(f, "Now playing {}", track),
            Report::PlaybackFailed { track, error } => {
                write!(f, "Error occurred when trying to play {}: {}", track, error)
            }
            Report::IdleTimeout => write!(f, "Nothing queued for a while, leaving the voice channel."),
            Report::Reconnected => write!(f, "Reconnected to the voice channel, resuming playback."),
            Report::ReconnectFailed(e) => write!(f, "Lost the voice connection and {}", e),
            Report::ReleaseFailed(e) => write!(f, "Stopped, but {}", e),
        }
    }
}

/// Fire-and-forget sink for user-visible status and errors.
///
/// Implementations must not block the caller and must swallow their own
/// failures; the session never waits on a report.
pub trait Reporter: Send + Sync {
    fn report(&self, guild_id: GuildId, channel_id: Option<ChannelId>, report: Report);
}
