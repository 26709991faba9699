//! # UI Module
//!
//! Discord-facing presentation: embeds for command responses and the
//! reporter that posts session announcements.

pub mod embeds;
pub mod reporter;
