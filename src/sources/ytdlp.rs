use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::{ChannelId, UserId};
use std::{path::PathBuf, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{is_url, TrackResolver};
use crate::{audio::track::Track, error::ResolutionError};

/// Información extraída de yt-dlp (`-j`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    /// Presente cuando yt-dlp devuelve una búsqueda como playlist
    entries: Option<Vec<YtDlpInfo>>,
}

/// Resolver que delega en el binario `yt-dlp`.
pub struct YtDlpResolver {
    binary: PathBuf,
    timeout: Duration,
    // Limitar procesos concurrentes para evitar rate limiting
    permits: Semaphore,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            permits: Semaphore::new(3),
        }
    }

    /// Argumentos de yt-dlp para una consulta
    fn args(query: &str) -> Vec<String> {
        let query = query.trim();
        let target = if is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        };

        ["-j", "--no-playlist", "--no-warnings", "-f", "bestaudio/best"]
            .into_iter()
            .map(String::from)
            .chain(std::iter::once(target))
            .collect()
    }

    async fn run(&self, query: &str) -> Result<Vec<u8>, ResolutionError> {
        let _permit = self.permits.acquire().await.map_err(|e| ResolutionError::Extractor {
            query: query.to_string(),
            cause: e.to_string(),
        })?;

        debug!("🔍 Ejecutando {} para: {}", self.binary.display(), query);

        let mut command = Command::new(&self.binary);
        command.args(Self::args(query)).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ResolutionError::TimedOut(query.to_string()))?
            .map_err(|e| ResolutionError::Extractor {
                query: query.to_string(),
                cause: format!("couldn't run {}: {e}", self.binary.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp falló para {}: {}", query, stderr.trim());
            return Err(ResolutionError::Extractor {
                query: query.to_string(),
                cause: first_error_line(&stderr),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(
        &self,
        query: &str,
        requester: UserId,
        channel_id: ChannelId,
    ) -> Result<Track, ResolutionError> {
        info!("🔍 Resolviendo: {}", query);

        let stdout = self.run(query).await?;
        let track = parse_output(query, &stdout, requester, channel_id)?;

        info!("✅ Resuelto: {} ({})", track.title(), track.id());
        Ok(track)
    }
}

/// Convierte la salida JSON de yt-dlp en un [`Track`]
fn parse_output(
    query: &str,
    stdout: &[u8],
    requester: UserId,
    channel_id: ChannelId,
) -> Result<Track, ResolutionError> {
    let not_found = || ResolutionError::NotFound(query.to_string());

    // Con búsquedas yt-dlp imprime un objeto JSON por línea
    let line = String::from_utf8_lossy(stdout);
    let line = line.lines().find(|l| !l.trim().is_empty()).ok_or_else(not_found)?;

    let mut info: YtDlpInfo = serde_json::from_str(line).map_err(|e| ResolutionError::Extractor {
        query: query.to_string(),
        cause: format!("unexpected yt-dlp output: {e}"),
    })?;

    if let Some(entries) = info.entries.take() {
        info = entries.into_iter().next().ok_or_else(not_found)?;
    }

    let stream_url = info.url.ok_or_else(not_found)?;
    let title = info.title.unwrap_or_else(|| "Unknown".to_string());
    let id = info.id.unwrap_or_else(|| stream_url.clone());

    let mut track = Track::new(id, title, stream_url, requester, channel_id);
    if let Some(uploader) = info.uploader {
        track = track.with_uploader(uploader);
    }
    if let Some(duration) = info
        .duration
        .filter(|d| *d > 0.0)
        .and_then(|d| Duration::try_from_secs_f64(d).ok())
    {
        track = track.with_duration(duration);
    }
    if let Some(webpage_url) = info.webpage_url {
        track = track.with_webpage_url(webpage_url);
    }
    if let Some(thumbnail) = info.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }
    Ok(track)
}

fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("yt-dlp exited with an error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const USER: UserId = UserId::new(7);
    const CHANNEL: ChannelId = ChannelId::new(8);

    #[test]
    fn search_terms_use_the_first_result() {
        let args = YtDlpResolver::args(" lofi hip hop ");
        assert_eq!(args.last().map(String::as_str), Some("ytsearch1:lofi hip hop"));
        assert!(args.iter().any(|a| a == "--no-playlist"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "bestaudio/best"));
    }

    #[test]
    fn urls_are_passed_through() {
        let args = YtDlpResolver::args("https://youtu.be/abc");
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[test]
    fn parses_a_single_video() {
        let json = br#"{"id":"abc","title":"Song","url":"https://cdn/audio","duration":215.4,
            "uploader":"Band","webpage_url":"https://youtu.be/abc","thumbnail":"https://img/abc.jpg"}"#;
        let json = String::from_utf8_lossy(json).replace('\n', "");

        let track = parse_output("song", json.as_bytes(), USER, CHANNEL).unwrap();
        assert_eq!(track.id(), "abc");
        assert_eq!(track.title(), "Song");
        assert_eq!(track.stream_url(), "https://cdn/audio");
        assert_eq!(track.uploader(), Some("Band"));
        assert_eq!(track.duration(), Some(Duration::from_secs_f64(215.4)));
        assert_eq!(track.requested_by(), USER);
        assert_eq!(track.channel_id(), CHANNEL);
    }

    #[test]
    fn takes_the_first_playlist_entry() {
        let json = br#"{"title":"ytsearch1:song","entries":[{"id":"x","title":"First","url":"https://cdn/x"}]}"#;
        let track = parse_output("song", json, USER, CHANNEL).unwrap();
        assert_eq!(track.id(), "x");
        assert_eq!(track.duration(), None);
    }

    #[test]
    fn out_of_range_durations_are_dropped() {
        let json = br#"{"id":"live","title":"Stream","url":"https://cdn/live","duration":1e300}"#;
        let track = parse_output("stream", json, USER, CHANNEL).unwrap();
        assert_eq!(track.duration(), None);

        let json = br#"{"id":"neg","title":"Odd","url":"https://cdn/neg","duration":-3.0}"#;
        let track = parse_output("odd", json, USER, CHANNEL).unwrap();
        assert_eq!(track.duration(), None);
    }

    #[test]
    fn empty_results_are_not_found() {
        assert_eq!(
            parse_output("nothing", b"\n", USER, CHANNEL).unwrap_err(),
            ResolutionError::NotFound("nothing".to_string())
        );
        assert_eq!(
            parse_output("nothing", br#"{"entries":[]}"#, USER, CHANNEL).unwrap_err(),
            ResolutionError::NotFound("nothing".to_string())
        );
    }

    #[test]
    fn garbage_output_is_an_extractor_error() {
        assert!(matches!(
            parse_output("q", b"<html>", USER, CHANNEL),
            Err(ResolutionError::Extractor { .. })
        ));
    }

    #[test]
    fn picks_the_yt_dlp_error_line() {
        let stderr = "WARNING: something\nERROR: [youtube] abc: Video unavailable\n";
        assert_eq!(first_error_line(stderr), "ERROR: [youtube] abc: Video unavailable");
        assert_eq!(first_error_line(""), "yt-dlp exited with an error");
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp", Duration::from_secs(5));
        let err = resolver.resolve("song", USER, CHANNEL).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Extractor { .. }));
    }
}
