//! Conversions between stored units and human units.

/// Reference frequency of absolute cent 0 (MIDI key 0).
pub const ABSOLUTE_CENT_HZ: f64 = 8.175_798_915_643_707;

/// Timecents to seconds.
pub fn timecents_to_seconds(tc: i32) -> f64 {
    2f64.powf(f64::from(tc) / 1200.0)
}

/// Seconds to timecents, rounded. Non-positive input maps to the floor
/// value -12000 (about one millisecond).
pub fn seconds_to_timecents(seconds: f64) -> i32 {
    if seconds <= 0.0 {
        return -12000;
    }
    (1200.0 * seconds.log2()).round().clamp(-32768.0, 32767.0) as i32
}

/// Absolute cents to hertz.
pub fn abs_cents_to_hz(cents: i32) -> f64 {
    ABSOLUTE_CENT_HZ * 2f64.powf(f64::from(cents) / 1200.0)
}

/// Hertz to absolute cents, rounded.
pub fn hz_to_abs_cents(hz: f64) -> i32 {
    if hz <= 0.0 {
        return 0;
    }
    (1200.0 * (hz / ABSOLUTE_CENT_HZ).log2())
        .round()
        .clamp(-32768.0, 32767.0) as i32
}

/// Centibels to decibels.
pub fn centibels_to_db(cb: i32) -> f64 {
    f64::from(cb) / 10.0
}

/// Decibels to centibels, rounded.
pub fn db_to_centibels(db: f64) -> i32 {
    (db * 10.0).round() as i32
}

/// Tenths of a percent to percent.
pub fn permille_to_percent(value: i32) -> f64 {
    f64::from(value) / 10.0
}

/// Percent to tenths of a percent, rounded.
pub fn percent_to_permille(percent: f64) -> i32 {
    (percent * 10.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timecents() {
        assert!((timecents_to_seconds(0) - 1.0).abs() < 1e-9);
        assert!((timecents_to_seconds(1200) - 2.0).abs() < 1e-9);
        assert_eq!(seconds_to_timecents(0.5), -1200);
        assert_eq!(seconds_to_timecents(0.0), -12000);
    }

    #[test]
    fn test_absolute_cents() {
        // 13500 absolute cents is roughly 19914 Hz
        assert!((abs_cents_to_hz(13500) - 19912.0).abs() < 5.0);
        assert_eq!(hz_to_abs_cents(abs_cents_to_hz(6900)), 6900);
        // A4
        assert!((abs_cents_to_hz(6900) - 440.0).abs() < 0.01);
    }

    #[test]
    fn test_centibels_and_permille() {
        assert_eq!(centibels_to_db(60), 6.0);
        assert_eq!(db_to_centibels(-6.0), -60);
        assert_eq!(permille_to_percent(500), 50.0);
        assert_eq!(percent_to_permille(-25.0), -250);
    }
}
