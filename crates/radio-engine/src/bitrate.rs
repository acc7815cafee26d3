//! Bitrate parsing.
//!
//! Converts human-readable bitrate settings (`"96k"`, `"128000"`) into the
//! bytes-per-second rate used to pace station playback.

/// Bitrate substituted when a setting cannot be parsed (bits per second).
pub const DEFAULT_BITRATE_BPS: u64 = 128_000;

/// Parse a bitrate setting into bytes per second.
///
/// A trailing `k` (case-insensitive) multiplies the value by 1000; anything else
/// is taken as bits per second. Unparsable or non-positive values fall back to
/// [`DEFAULT_BITRATE_BPS`] with a warning.
pub fn parse_bitrate(spec: &str) -> u64 {
    let normalized = spec.trim().to_lowercase();
    let (digits, multiplier) = match normalized.strip_suffix('k') {
        Some(rest) => (rest, 1000),
        None => (normalized.as_str(), 1),
    };

    let bits_per_second = match digits.parse::<i64>() {
        Ok(n) if n > 0 => (n as u64).saturating_mul(multiplier),
        Ok(n) => {
            tracing::warn!(value = spec, parsed = n, "invalid bitrate, using 128k");
            DEFAULT_BITRATE_BPS
        }
        Err(e) => {
            tracing::warn!(value = spec, error = %e, "invalid bitrate, using 128k");
            DEFAULT_BITRATE_BPS
        }
    };
    bits_per_second / 8
}

/// Render a bytes-per-second rate back into the `"<n>k"` form used in config.
pub fn format_bitrate(bytes_per_second: u64) -> String {
    let bits = bytes_per_second.saturating_mul(8);
    if bits % 1000 == 0 {
        format!("{}k", bits / 1000)
    } else {
        bits.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bitrate_handles_kilo_suffix() {
        assert_eq!(parse_bitrate("96k"), 12000);
        assert_eq!(parse_bitrate("320k"), 40000);
    }

    #[test]
    fn parse_bitrate_accepts_plain_bits_per_second() {
        assert_eq!(parse_bitrate("128000"), 16000);
        assert_eq!(parse_bitrate("64000"), 8000);
    }

    #[test]
    fn parse_bitrate_trims_and_ignores_case() {
        assert_eq!(parse_bitrate(" 320K "), 40000);
        assert_eq!(parse_bitrate("\t96k\n"), 12000);
    }

    #[test]
    fn parse_bitrate_falls_back_on_garbage() {
        assert_eq!(parse_bitrate("bad"), 16000);
        assert_eq!(parse_bitrate(""), 16000);
        assert_eq!(parse_bitrate("k"), 16000);
        assert_eq!(parse_bitrate("12.5k"), 16000);
    }

    #[test]
    fn parse_bitrate_falls_back_on_non_positive() {
        assert_eq!(parse_bitrate("0"), 16000);
        assert_eq!(parse_bitrate("0k"), 16000);
        assert_eq!(parse_bitrate("-5k"), 16000);
    }

    #[test]
    fn parse_bitrate_truncates_toward_zero() {
        assert_eq!(parse_bitrate("7"), 0);
        assert_eq!(parse_bitrate("1001"), 125);
    }

    #[test]
    fn format_bitrate_prefers_kilo_form() {
        assert_eq!(format_bitrate(12000), "96k");
        assert_eq!(format_bitrate(125), "1k");
        assert_eq!(format_bitrate(126), "1008");
    }
}
