//! Real-time pacing for broadcast chunks.
//!
//! Emission is paced against a deadline anchored at the start of the track, so
//! time spent broadcasting is subtracted from the next wait instead of
//! accumulating as drift.

use std::time::{Duration, Instant};

/// Lag beyond which the pacer re-anchors instead of bursting to catch up.
pub const MAX_LAG: Duration = Duration::from_secs(2);

/// Playback time represented by `bytes` at `bytes_per_second`.
pub fn chunk_duration(bytes: u64, bytes_per_second: u64) -> Duration {
    let bps = bytes_per_second.max(1) as u128;
    let nanos = bytes as u128 * 1_000_000_000 / bps;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Deadline-based pacer for a single stream of bytes.
#[derive(Debug)]
pub struct Pacer {
    bytes_per_second: u64,
    anchor: Instant,
    emitted: u64,
}

impl Pacer {
    pub fn new(bytes_per_second: u64) -> Self {
        Self::with_anchor(bytes_per_second, Instant::now())
    }

    fn with_anchor(bytes_per_second: u64, anchor: Instant) -> Self {
        Self {
            bytes_per_second: bytes_per_second.max(1),
            anchor,
            emitted: 0,
        }
    }

    /// Restart the deadline from now (track boundaries, after idle waits).
    pub fn reset(&mut self) {
        self.anchor = Instant::now();
        self.emitted = 0;
    }

    /// Record `bytes` as emitted and return how long to wait before the next chunk.
    pub fn delay_after(&mut self, bytes: usize) -> Duration {
        self.delay_after_at(bytes, Instant::now())
    }

    fn delay_after_at(&mut self, bytes: usize, now: Instant) -> Duration {
        self.emitted = self.emitted.saturating_add(bytes as u64);
        let deadline = self.anchor + chunk_duration(self.emitted, self.bytes_per_second);
        if deadline > now {
            return deadline - now;
        }
        if now - deadline > MAX_LAG {
            tracing::debug!(
                lag_ms = (now - deadline).as_millis() as u64,
                "pacer fell behind; re-anchoring"
            );
            self.anchor = now;
            self.emitted = 0;
        }
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_duration_matches_rate() {
        assert_eq!(chunk_duration(12000, 12000), Duration::from_secs(1));
        assert_eq!(chunk_duration(6000, 12000), Duration::from_millis(500));
        assert_eq!(chunk_duration(32 * 1024, 16000), Duration::from_millis(2048));
    }

    #[test]
    fn chunk_duration_tolerates_zero_rate() {
        assert_eq!(chunk_duration(3, 0), Duration::from_secs(3));
    }

    #[test]
    fn delay_is_full_chunk_when_on_time() {
        let start = Instant::now();
        let mut pacer = Pacer::with_anchor(1000, start);
        assert_eq!(pacer.delay_after_at(500, start), Duration::from_millis(500));
    }

    #[test]
    fn delay_subtracts_time_spent_broadcasting() {
        let start = Instant::now();
        let mut pacer = Pacer::with_anchor(1000, start);
        let first = pacer.delay_after_at(1000, start);
        assert_eq!(first, Duration::from_secs(1));
        // Second chunk emitted 300ms late: the wait shrinks accordingly.
        let late = start + Duration::from_millis(1300);
        assert_eq!(pacer.delay_after_at(1000, late), Duration::from_millis(700));
    }

    #[test]
    fn no_delay_when_behind_schedule() {
        let start = Instant::now();
        let mut pacer = Pacer::with_anchor(1000, start);
        let later = start + Duration::from_millis(1500);
        assert_eq!(pacer.delay_after_at(1000, later), Duration::ZERO);
        assert_eq!(pacer.emitted, 1000);
    }

    #[test]
    fn large_lag_reanchors() {
        let start = Instant::now();
        let mut pacer = Pacer::with_anchor(1000, start);
        let stalled = start + Duration::from_secs(10);
        assert_eq!(pacer.delay_after_at(1000, stalled), Duration::ZERO);
        assert_eq!(pacer.emitted, 0);
        assert_eq!(pacer.anchor, stalled);
        assert_eq!(
            pacer.delay_after_at(1000, stalled),
            Duration::from_secs(1)
        );
    }
}
