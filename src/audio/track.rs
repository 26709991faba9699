use serenity::model::id::{ChannelId, UserId};
use std::{fmt, time::Duration};

/// A resolved, playable item plus who asked for it.
///
/// Tracks are immutable once built. The queue hands them around as
/// `Arc<Track>` so the current slot, the player and the queue views can share
/// the same value without copying metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    id: String,
    title: String,
    uploader: Option<String>,
    duration: Option<Duration>,
    stream_url: String,
    webpage_url: Option<String>,
    thumbnail: Option<String>,
    requested_by: UserId,
    channel_id: ChannelId,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        stream_url: impl Into<String>,
        requested_by: UserId,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            uploader: None,
            duration: None,
            stream_url: stream_url.into(),
            webpage_url: None,
            thumbnail: None,
            requested_by,
            channel_id,
        }
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn uploader(&self) -> Option<&str> {
        self.uploader.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
    pub fn webpage_url(&self) -> Option<&str> {
        self.webpage_url.as_deref()
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    /// Canal de texto desde donde se pidió el track
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    // Builders
    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_webpage_url(mut self, url: impl Into<String>) -> Self {
        self.webpage_url = Some(url.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.uploader {
            Some(uploader) => write!(f, "**{}** by **{}**", self.title, uploader),
            None => write!(f, "**{}**", self.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_uploader_when_known() {
        let track = Track::new("abc", "Song", "https://cdn/song", UserId::new(1), ChannelId::new(2))
            .with_uploader("Band");
        assert_eq!(track.to_string(), "**Song** by **Band**");

        let bare = Track::new("abc", "Song", "https://cdn/song", UserId::new(1), ChannelId::new(2));
        assert_eq!(bare.to_string(), "**Song**");
    }
}
