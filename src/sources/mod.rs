//! # Sources Module
//!
//! Turns a user query (free text or URL) into a playable [`Track`].

pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, UserId};

use crate::{audio::track::Track, error::ResolutionError};

pub use ytdlp::YtDlpResolver;

/// Resolución de consultas a tracks reproducibles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resolves `query` for `requester`; `channel_id` is where the request came from.
    async fn resolve(
        &self,
        query: &str,
        requester: UserId,
        channel_id: ChannelId,
    ) -> Result<Track, ResolutionError>;
}

/// Verifica si la consulta es una URL http(s)
pub fn is_url(query: &str) -> bool {
    url::Url::parse(query.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}
