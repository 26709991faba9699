//! # Audio Module
//!
//! Playable items and the seams between a session and the voice stack.
//!
//! ### [`track`] - Track
//! - Immutable metadata of a resolved item plus its requester
//!
//! ### [`queue`] - Queue Management
//! - Multi-producer, single-consumer FIFO with a blocking, timed dequeue
//! - Shuffle, indexed removal and paginated views
//!
//! ### [`player`] - Player
//! - The [`player::Player`] capability a session drives
//! - Single-shot [`player::CompletionNotifier`] per `play` call
//! - Songbird implementation over a voice `Call`
//!
//! ### [`transport`] - Voice Connections
//! - Connect / move / release through songbird's manager

pub mod player;
pub mod queue;
pub mod track;
pub mod transport;
