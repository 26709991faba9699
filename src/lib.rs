//! # Guild Jukebox
//!
//! Per-guild playback sessions for a Discord music bot: an independent queue,
//! a single playback loop, loop mode, volume and skip voting for every guild,
//! plus idle disconnect and one-shot reconnect after an unexpected drop.
//!
//! ## Layout
//!
//! - [`session`] - session state machine, playback loop and registry
//! - [`audio`] - tracks, queue and the player/transport seams (songbird)
//! - [`sources`] - query resolution through yt-dlp
//! - [`bot`] - serenity event handler and slash commands
//! - [`ui`] - embeds and the Discord reporter
//! - [`config`] - environment configuration

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod session;
pub mod sources;
pub mod ui;
