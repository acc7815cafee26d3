//! Playback and broadcast engine for the radio relay.
//!
//! A [`Player`] owns named [`Station`]s. Each station loops a fixed playlist of
//! already-encoded files on its own thread, paces reads to the configured
//! bitrate and fans the bytes out to every attached [`Listener`].
//!
//! Slow listeners lose chunks rather than slowing the station down.

pub mod bitrate;
pub mod config;
pub mod listener;
pub mod pacing;
pub mod player;
pub mod station;

pub use bitrate::{format_bitrate, parse_bitrate};
pub use config::{EngineConfig, StationConfig};
pub use listener::{Detach, Listener, ListenerId};
pub use player::Player;
pub use station::{Station, StationState, StationStats};
