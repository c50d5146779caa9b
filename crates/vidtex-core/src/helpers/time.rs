// crates/vidtex-core/src/helpers/time.rs
//
// Clock arithmetic for the playhead. Everything inside the pipeline is an
// i64 count of microseconds; hosts hand us f32 seconds per tick and read
// milliseconds back.

use std::time::Duration;

pub const MICROS_PER_MILLI: i64 = 1_000;
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Convert a host tick delta to microseconds.
///
/// Rounds to the nearest microsecond so that common deltas such as `0.016`
/// survive the f32 round trip. Zero, negative and non-finite deltas count as
/// no elapsed time.
///
/// ```
/// use vidtex_core::helpers::time::dt_seconds_to_micros;
/// assert_eq!(dt_seconds_to_micros(0.016), 16_000);
/// assert_eq!(dt_seconds_to_micros(0.033), 33_000);
/// assert_eq!(dt_seconds_to_micros(-1.0), 0);
/// assert_eq!(dt_seconds_to_micros(f32::NAN), 0);
/// ```
pub fn dt_seconds_to_micros(dt_seconds: f32) -> i64 {
    if !dt_seconds.is_finite() || dt_seconds <= 0.0 {
        return 0;
    }
    (dt_seconds as f64 * MICROS_PER_SEC as f64).round() as i64
}

/// Picture timestamp relative to the stream anchor. Saturates instead of
/// overflowing on garbage timestamps.
///
/// ```
/// use vidtex_core::helpers::time::relative_micros;
/// assert_eq!(relative_micros(1_500_000, 1_000_000), 500_000);
/// assert_eq!(relative_micros(900_000, 1_000_000), -100_000);
/// ```
pub fn relative_micros(timestamp_us: i64, anchor_us: i64) -> i64 {
    timestamp_us.saturating_sub(anchor_us)
}

/// Whole milliseconds, truncated toward zero.
pub fn micros_to_millis(us: i64) -> i64 {
    us / MICROS_PER_MILLI
}

/// Non-negative microsecond count as a `Duration`; negatives clamp to zero.
pub fn micros_to_duration(us: i64) -> Duration {
    Duration::from_micros(us.max(0) as u64)
}

/// Rescale a timestamp from a `num/den` time base to microseconds.
/// A zero denominator yields 0 rather than dividing by zero.
///
/// ```
/// use vidtex_core::helpers::time::rescale_to_micros;
/// assert_eq!(rescale_to_micros(90_000, 1, 90_000), 1_000_000);
/// assert_eq!(rescale_to_micros(3, 1001, 30_000), 100_100);
/// ```
pub fn rescale_to_micros(ts: i64, num: i32, den: i32) -> i64 {
    if den == 0 {
        return 0;
    }
    let v = ts as i128 * num as i128 * MICROS_PER_SEC as i128 / den as i128;
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Format a playhead as `MM:SS.mmm` for logs and host overlays.
///
/// ```
/// use vidtex_core::helpers::time::format_playhead;
/// assert_eq!(format_playhead(0),          "00:00.000");
/// assert_eq!(format_playhead(61_500_000), "01:01.500");
/// assert_eq!(format_playhead(-5),         "00:00.000");
/// ```
pub fn format_playhead(us: i64) -> String {
    let ms = micros_to_millis(us.max(0));
    let m  = ms / 60_000;
    let s  = (ms / 1_000) % 60;
    let f  = ms % 1_000;
    format!("{m:02}:{s:02}.{f:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_truncate_toward_zero() {
        assert_eq!(micros_to_millis(1_999), 1);
        assert_eq!(micros_to_millis(-1_999), -1);
    }

    #[test]
    fn duration_clamps_negative() {
        assert_eq!(micros_to_duration(-10), Duration::ZERO);
        assert_eq!(micros_to_duration(2_500), Duration::from_micros(2_500));
    }

    #[test]
    fn relative_saturates() {
        assert_eq!(relative_micros(i64::MIN, 1), i64::MIN);
    }

    #[test]
    fn tiny_dt_still_advances() {
        assert_eq!(dt_seconds_to_micros(0.000_001), 1);
    }
}
