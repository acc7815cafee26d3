use std::time::Duration;

use crate::bitrate::parse_bitrate;

/// Bytes read from a track per broadcast chunk.
pub const CHUNK_SIZE: usize = 32 * 1024;
/// Chunks buffered per listener before new chunks are dropped for it.
pub const LISTENER_CAPACITY: usize = 16;
/// Largest read-ahead window a station allocates, whatever `buffer_seconds` says.
pub const MAX_BUFFER_WINDOW: usize = 8 * 1024 * 1024;
/// Back-off applied when a station has nothing playable.
pub const IDLE_WAIT: Duration = Duration::from_secs(1);

/// Engine settings shared by every station of a player.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Output bitrate, e.g. `"96k"` or `"128000"`.
    pub output_bitrate: String,
    /// Read-ahead window length in seconds.
    pub buffer_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_bitrate: "96k".to_string(),
            buffer_seconds: 7,
        }
    }
}

/// Per-station tuning derived from [`EngineConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationConfig {
    /// Pacing rate; always at least 1.
    pub bytes_per_second: u64,
    /// Capacity of the buffered track reader.
    pub buffer_window: usize,
    /// Size of each broadcast chunk.
    pub chunk_size: usize,
    /// Queue depth per listener.
    pub listener_capacity: usize,
    /// Wait between cycles of a playlist with no playable tracks.
    pub idle_wait: Duration,
}

impl StationConfig {
    /// Build a station config for a given rate, deriving the buffer window.
    pub fn new(bytes_per_second: u64, buffer_seconds: u64) -> Self {
        let bytes_per_second = bytes_per_second.max(1);
        let window = bytes_per_second.saturating_mul(buffer_seconds);
        let buffer_window = match usize::try_from(window) {
            Ok(0) => CHUNK_SIZE,
            Ok(w) if w <= MAX_BUFFER_WINDOW => w,
            _ => {
                tracing::warn!(
                    bytes_per_second,
                    buffer_seconds,
                    max = MAX_BUFFER_WINDOW,
                    "buffer window too large; clamping"
                );
                MAX_BUFFER_WINDOW
            }
        };
        Self {
            bytes_per_second,
            buffer_window,
            chunk_size: CHUNK_SIZE,
            listener_capacity: LISTENER_CAPACITY,
            idle_wait: IDLE_WAIT,
        }
    }
}

impl From<&EngineConfig> for StationConfig {
    fn from(cfg: &EngineConfig) -> Self {
        StationConfig::new(parse_bitrate(&cfg.output_bitrate), cfg.buffer_seconds)
    }
}
