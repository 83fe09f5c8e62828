//! Capture timestamp precision.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Use timestamps with microsecond precision (the default).
pub const PCAP_TSTAMP_PRECISION_MICRO: i32 = 0;
/// Use timestamps with nanosecond precision.
pub const PCAP_TSTAMP_PRECISION_NANO: i32 = 1;

/// Timestamp precision of a capture handle.
///
/// The discriminant is the native `PCAP_TSTAMP_PRECISION_*` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum TimestampPrecision {
    Micro = 0,
    Nano = 1,
}

impl Default for TimestampPrecision {
    fn default() -> Self {
        TimestampPrecision::Micro
    }
}

impl TimestampPrecision {
    /// Units per second.
    pub const fn scale(self) -> i64 {
        match self {
            TimestampPrecision::Micro => 1_000_000,
            TimestampPrecision::Nano => 1_000_000_000,
        }
    }

    /// Flatten seconds plus fraction into a single count of units.
    ///
    /// Arithmetic wraps on overflow (two's complement) rather than
    /// panicking; nanosecond timestamps overflow past the year 2262.
    pub const fn to_epoch_time(self, epoch_seconds: i64, fraction_of_second: i64) -> i64 {
        epoch_seconds
            .wrapping_mul(self.scale())
            .wrapping_add(fraction_of_second)
    }

    pub const fn to_epoch_seconds(self, epoch_time: i64) -> i64 {
        epoch_time / self.scale()
    }

    pub const fn to_fraction_of_second(self, epoch_time: i64) -> i64 {
        epoch_time % self.scale()
    }

    /// Milliseconds since the epoch. Wraps like [`Self::to_epoch_time`].
    pub const fn to_epoch_millis(self, epoch_seconds: i64, fraction_of_second: i64) -> i64 {
        self.to_epoch_time(epoch_seconds, fraction_of_second) / (self.scale() / 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_values() {
        assert_eq!(i32::from(TimestampPrecision::Micro), 0);
        assert_eq!(i32::from(TimestampPrecision::Nano), 1);
        assert_eq!(TimestampPrecision::try_from(1).unwrap(), TimestampPrecision::Nano);
        assert!(TimestampPrecision::try_from(2).is_err());
        assert_eq!(TimestampPrecision::default(), TimestampPrecision::Micro);
    }

    #[test]
    fn test_micro_round_trip() {
        let p = TimestampPrecision::Micro;
        let t = p.to_epoch_time(1_700_000_000, 123_456);
        assert_eq!(t, 1_700_000_000_123_456);
        assert_eq!(p.to_epoch_seconds(t), 1_700_000_000);
        assert_eq!(p.to_fraction_of_second(t), 123_456);
        assert_eq!(p.to_epoch_millis(1_700_000_000, 123_456), 1_700_000_000_123);
    }

    #[test]
    fn test_overflow_wraps() {
        let p = TimestampPrecision::Nano;
        let seconds = i64::MAX / p.scale() + 1;
        let t = p.to_epoch_time(seconds, 5);
        assert_eq!(t, -9_223_372_036_709_551_611);
        assert_eq!(t, seconds.wrapping_mul(1_000_000_000).wrapping_add(5));
        assert_eq!(p.to_epoch_millis(seconds, 5), -9_223_372_036_709);
        assert_eq!(p.to_epoch_time(i64::MAX / p.scale(), 0), 9_223_372_036_000_000_000);
        assert_eq!(
            TimestampPrecision::Micro.to_epoch_time(1, i64::MAX),
            i64::MIN + 999_999
        );
    }

    #[test]
    fn test_nano_round_trip() {
        let p = TimestampPrecision::Nano;
        let t = p.to_epoch_time(42, 999_999_999);
        assert_eq!(p.to_epoch_seconds(t), 42);
        assert_eq!(p.to_fraction_of_second(t), 999_999_999);
        assert_eq!(p.to_epoch_millis(42, 999_999_999), 42_999);
    }
}
