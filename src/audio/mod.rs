//! # Audio Module
//!
//! Per-guild music playback for the jukebox bot.
//!
//! ## Architecture
//!
//! ### [`player`] - Entry point
//! - Resolves queries into tracks outside any guild's controller
//! - Routes requests to the guild's mailbox, spawning the controller lazily
//!
//! ### [`controller`] - Playback state machine
//! - One tokio task per guild, fed by an mpsc mailbox
//! - Auto-advance on track end, idle grace timer, voice-loss cleanup
//!
//! ### [`queue`] - Queue Management
//! - FIFO of pending tracks, safe under concurrent enqueue
//! - Registry that hands out one queue per guild
//!
//! ### [`voice`] / [`songbird_voice`] - Voice connection
//! - Narrow trait over the voice driver so the controller can be tested
//! - Songbird implementation that streams Ogg/Opus from ffmpeg
//!
//! ## Audio Quality
//!
//! - **Sample Rate**: 48kHz (Discord standard)
//! - **Channels**: Stereo
//! - **Encoding**: Opus at 96kbps

pub mod controller;
pub mod notify;
pub mod player;
pub mod queue;
pub mod songbird_voice;
pub mod track;
pub mod voice;

#[cfg(test)]
pub mod testing;
