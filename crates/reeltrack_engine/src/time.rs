//! Fixed-point time: an exact tick count plus the half-open ranges built
//! from it.
//!
//! Every other module samples, truncates and compares time through this
//! module instead of touching `i64`/`f32` directly, the same discipline
//! `motiongfx_engine` applies by routing every interpolation through
//! `crate::interpolation::Interpolation` instead of ad-hoc `lerp` calls.

use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Ticks per second. Highly composite so that every sample rate a project
/// is likely to use (24, 25, 30, 48, 50, 60, 120, 144, 240, 1000, ...)
/// divides it evenly.
pub const BASE_RATE: u32 = 60_000;

/// A signed count of ticks, one tick = `1 / BASE_RATE` seconds.
///
/// All arithmetic is exact integer arithmetic; there is no NaN and no
/// infinity. Addition and subtraction saturate at `i64::MIN`/`i64::MAX`
/// rather than overflow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct T(i64);

impl T {
    pub const ZERO: T = T(0);
    pub const MIN: T = T(i64::MIN);
    pub const MAX: T = T(i64::MAX);

    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        T(ticks)
    }

    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// `i` frames at `rate` samples/second, i.e. `i * BASE_RATE / rate`.
    ///
    /// Fails [`EngineError::InvalidSampleRate`] if `rate` does not evenly
    /// divide [`BASE_RATE`], or is zero.
    pub fn from_frames(i: i64, rate: u32) -> Result<Self> {
        period_ticks(rate).map(|period| T(i * period))
    }

    /// Number of whole `rate`-spaced frames covered by `range`, truncating
    /// any remainder shorter than one frame period.
    pub fn frame_count(range: TimeRange, rate: u32) -> Result<i64> {
        let period = period_ticks(rate)?;
        Ok(range.duration().0 / period)
    }

    #[inline]
    pub fn saturating_add(self, rhs: T) -> T {
        T(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub fn saturating_sub(self, rhs: T) -> T {
        T(self.0.saturating_sub(rhs.0))
    }

    /// Scale by the rational `num / den`, rounding toward zero.
    pub fn scale_rational(self, num: i64, den: i64) -> T {
        debug_assert!(den != 0, "scale_rational: zero denominator");
        let scaled = (self.0 as i128 * num as i128) / den as i128;
        T(scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Greatest multiple of `step` not exceeding `self`.
    pub fn floor(self, step: T) -> T {
        if step.0 == 0 {
            return self;
        }
        T(self.0.div_euclid(step.0) * step.0)
    }

    /// Least multiple of `step` not less than `self`.
    pub fn ceil(self, step: T) -> T {
        if step.0 == 0 {
            return self;
        }
        let floored = self.floor(step);
        if floored == self {
            floored
        } else {
            floored.saturating_add(step)
        }
    }
}

fn period_ticks(rate: u32) -> Result<i64> {
    if rate == 0 || BASE_RATE % rate != 0 {
        return Err(EngineError::InvalidSampleRate {
            rate,
            base: BASE_RATE,
        });
    }
    Ok((BASE_RATE / rate) as i64)
}

impl Add for T {
    type Output = T;
    fn add(self, rhs: T) -> T {
        self.saturating_add(rhs)
    }
}

impl Sub for T {
    type Output = T;
    fn sub(self, rhs: T) -> T {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for T {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}t", self.0)
    }
}

/// A half-open `[start, end)` span of time, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: T,
    pub end: T,
}

impl TimeRange {
    /// Constructs a range, clamping `end` up to `start` if given inverted.
    pub fn new(start: T, end: T) -> Self {
        TimeRange {
            start,
            end: if end.0 < start.0 { start } else { end },
        }
    }

    pub const fn empty_at(t: T) -> Self {
        TimeRange { start: t, end: t }
    }

    #[inline]
    pub fn duration(self) -> T {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn contains(self, t: T) -> bool {
        t >= self.start && t < self.end
    }

    /// Overlap with `other`, or `None` if they share no time. Touching
    /// ranges (`self.end == other.start`) have no overlap.
    pub fn intersect(self, other: TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(TimeRange { start, end })
        } else {
            None
        }
    }

    #[inline]
    pub fn overlaps(self, other: TimeRange) -> bool {
        self.intersect(other).is_some()
    }

    /// Merge with `other` if the two are contiguous or overlapping;
    /// `None` if there's a time gap between them.
    pub fn union_if_contiguous(self, other: TimeRange) -> Option<TimeRange> {
        if self.end < other.start || other.end < self.start {
            return None;
        }
        Some(TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        })
    }

    pub fn clamp(self, bounds: TimeRange) -> TimeRange {
        TimeRange::new(
            self.start.max(bounds.start).min(bounds.end),
            self.end.min(bounds.end).max(bounds.start),
        )
    }

    pub fn shift(self, delta: T) -> TimeRange {
        TimeRange {
            start: self.start + delta,
            end: self.end + delta,
        }
    }

    /// Splits into `[start, t)` and `[t, end)`, clamping `t` into range
    /// first.
    pub fn split_at(self, t: T) -> (TimeRange, TimeRange) {
        let t = t.max(self.start).min(self.end);
        (
            TimeRange {
                start: self.start,
                end: t,
            },
            TimeRange {
                start: t,
                end: self.end,
            },
        )
    }
}

impl PartialOrd for TimeRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.start.cmp(&other.start).then(self.end.cmp(&other.end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_frames_divides_base_rate() {
        assert_eq!(T::from_frames(1, 30).unwrap(), T::from_ticks(2_000));
        assert_eq!(T::from_frames(60, 60).unwrap(), T::from_ticks(60_000));
    }

    #[test]
    fn from_frames_rejects_non_divisor() {
        let err = T::from_frames(1, 70).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSampleRate { rate: 70, .. }));
    }

    #[test]
    fn frame_count_truncates_partial_frame() {
        let range = TimeRange::new(T::ZERO, T::from_ticks(2_500));
        // At 30fps one frame is 2000 ticks; 2500 covers 1 whole frame.
        assert_eq!(T::frame_count(range, 30).unwrap(), 1);
    }

    #[test]
    fn floor_and_ceil_to_step() {
        let step = T::from_ticks(1_000);
        assert_eq!(T::from_ticks(2_500).floor(step), T::from_ticks(2_000));
        assert_eq!(T::from_ticks(2_500).ceil(step), T::from_ticks(3_000));
        assert_eq!(T::from_ticks(2_000).floor(step), T::from_ticks(2_000));
        assert_eq!(T::from_ticks(-2_500).floor(step), T::from_ticks(-3_000));
    }

    #[test]
    fn intersect_excludes_touching_ranges() {
        let a = TimeRange::new(T::ZERO, T::from_ticks(10));
        let b = TimeRange::new(T::from_ticks(10), T::from_ticks(20));
        assert_eq!(a.intersect(b), None);

        let c = TimeRange::new(T::from_ticks(5), T::from_ticks(15));
        assert_eq!(
            a.intersect(c),
            Some(TimeRange::new(T::from_ticks(5), T::from_ticks(10)))
        );
    }

    #[test]
    fn union_if_contiguous_allows_touching() {
        let a = TimeRange::new(T::ZERO, T::from_ticks(10));
        let b = TimeRange::new(T::from_ticks(10), T::from_ticks(20));
        assert_eq!(
            a.union_if_contiguous(b),
            Some(TimeRange::new(T::ZERO, T::from_ticks(20)))
        );

        let c = TimeRange::new(T::from_ticks(11), T::from_ticks(20));
        assert_eq!(a.union_if_contiguous(c), None);
    }

    #[test]
    fn split_at_clamps_into_range() {
        let r = TimeRange::new(T::from_ticks(10), T::from_ticks(20));
        let (lhs, rhs) = r.split_at(T::from_ticks(5));
        assert_eq!(lhs, TimeRange::new(T::from_ticks(10), T::from_ticks(10)));
        assert_eq!(rhs, r);
    }
}
