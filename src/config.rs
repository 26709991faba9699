use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::session::SessionSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Sesiones
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub idle_timeout_secs: u64,
    pub skip_vote_threshold: usize,
    pub queue_page_size: usize,

    // Resolución de tracks
    pub resolve_timeout_secs: u64,
    pub ytdlp_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Construye la configuración a partir de una función de búsqueda de variables.
    ///
    /// Missing optional keys fall back to [`Config::default`]; a key that is
    /// present but unparsable is an error naming the variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            // Discord
            discord_token: value("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            application_id: parse(
                "APPLICATION_ID",
                value("APPLICATION_ID").context("APPLICATION_ID is not set")?,
            )?,
            guild_id: value("GUILD_ID").and_then(|s| s.trim().parse().ok()),

            // Sesiones
            default_volume: parse_or(&value, "DEFAULT_VOLUME", defaults.default_volume)?,
            max_queue_size: parse_or(&value, "MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            idle_timeout_secs: parse_or(&value, "IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
            skip_vote_threshold: parse_or(&value, "SKIP_VOTE_THRESHOLD", defaults.skip_vote_threshold)?,
            queue_page_size: parse_or(&value, "QUEUE_PAGE_SIZE", defaults.queue_page_size)?,

            // Resolución
            resolve_timeout_secs: parse_or(&value, "RESOLVE_TIMEOUT_SECS", defaults.resolve_timeout_secs)?,
            ytdlp_path: value("YTDLP_PATH").map_or(defaults.ytdlp_path, PathBuf::from),
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Queue size, page size and timeouts must be greater than 0
    /// - The skip threshold needs at least one vote
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.skip_vote_threshold == 0 {
            anyhow::bail!("Skip vote threshold must be at least 1");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Discord token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Sessions: {}% vol, {} max queue, {}s idle timeout, {} votes to skip\n  \
            Resolver: {} ({}s timeout)",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0).round() as u32,
            self.max_queue_size,
            self.idle_timeout_secs,
            self.skip_vote_threshold,
            self.ytdlp_path.display(),
            self.resolve_timeout_secs,
        )
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            skip_threshold: self.skip_vote_threshold,
            default_volume: self.default_volume,
            max_queue_size: self.max_queue_size,
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,
            idle_timeout_secs: 180,
            skip_vote_threshold: 3,
            queue_page_size: 10,

            resolve_timeout_secs: 30,
            ytdlp_path: "yt-dlp".into(),
        }
    }
}

fn parse<T>(key: &str, raw: String) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {raw:?}"))
}

fn parse_or<T>(value: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value(key) {
        Some(raw) => parse(key, raw),
        None => Ok(default),
    }
}
