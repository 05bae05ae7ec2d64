// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exact rational playback-time accumulation, without floating point.
//!
//! A [`Timer`] holds whole seconds plus a fractional remainder expressed in
//! units of `1/14112000` s — the LCM of the common MPEG sample rates
//! (16000, 22050, 24000, 32000, 44100, 48000 Hz) times a small common
//! factor, chosen so every frame duration in the supported sample rates is
//! an exact integer number of units (spec.md §4.5). This lets durations
//! accumulate across arbitrarily many frames with no rounding error.

/// Denominator of the fractional part, in units per second.
pub const UNITS_PER_SECOND: i64 = 14_112_000;

/// Resolution used by [`Timer::count`] and [`Timer::str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hours,
    Minutes,
    Seconds,
    Deciseconds,
    Centiseconds,
    Milliseconds,
}

/// An exact (seconds, fraction) duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timer {
    pub seconds: i64,
    /// Fraction of a second, in units of `1/UNITS_PER_SECOND`. Always in
    /// `0..UNITS_PER_SECOND` after normalization.
    pub fraction: i64,
}

/// Reduces `num/den` by dividing out factors of 2, 3, 5, and 7 — the only
/// prime factors appearing in the sample rates and in `UNITS_PER_SECOND`,
/// matching the reference implementation's generic `reduce()` fallback used
/// when `den` is not one of the fast-pathed common sample rates.
fn reduce(mut num: i64, mut den: i64) -> (i64, i64) {
    for prime in [2i64, 3, 5, 7] {
        while num % prime == 0 && den % prime == 0 {
            num /= prime;
            den /= prime;
        }
    }
    (num, den)
}

impl Timer {
    pub const ZERO: Timer = Timer { seconds: 0, fraction: 0 };

    fn normalize(mut seconds: i64, mut fraction: i64) -> Timer {
        if fraction >= UNITS_PER_SECOND {
            seconds += fraction / UNITS_PER_SECOND;
            fraction %= UNITS_PER_SECOND;
        }
        else if fraction < 0 {
            let borrow = (-fraction + UNITS_PER_SECOND - 1) / UNITS_PER_SECOND;
            seconds -= borrow;
            fraction += borrow * UNITS_PER_SECOND;
        }
        Timer { seconds, fraction }
    }

    /// Initializes a zero duration.
    pub fn init() -> Timer {
        Timer::ZERO
    }

    /// Sets this timer to exactly `n/d` seconds plus `seconds` whole
    /// seconds. When `d` is a common sample rate that evenly divides
    /// [`UNITS_PER_SECOND`], the multiplier is exact and immediate;
    /// otherwise the fraction `n/d` is gcd-reduced before being rescaled
    /// into timer units, matching spec.md §4.5.
    pub fn set(seconds: i64, n: i64, d: i64) -> Timer {
        if d == 0 {
            return Timer::normalize(seconds, 0);
        }

        if UNITS_PER_SECOND % d == 0 {
            let mult = UNITS_PER_SECOND / d;
            return Timer::normalize(seconds, n * mult);
        }

        let (rn, rd) = reduce(n, d);
        if UNITS_PER_SECOND % rd == 0 {
            let mult = UNITS_PER_SECOND / rd;
            Timer::normalize(seconds, rn * mult)
        }
        else {
            // General fallback: scale with 128-bit-safe i128 arithmetic to
            // avoid overflow, then truncate toward zero as the reference
            // implementation's generic path does.
            let fraction = (rn as i128) * (UNITS_PER_SECOND as i128) / (rd as i128);
            Timer::normalize(seconds, fraction as i64)
        }
    }

    /// Builds the exact duration of one frame: `parts / sfreq` seconds,
    /// where `parts = 32 * nsbsamples` (spec.md §4.4 "Duration is exact").
    pub fn frame_duration(nsbsamples: u32, sfreq: u32) -> Timer {
        let parts = 32 * nsbsamples as i64;
        Timer::set(0, parts, sfreq as i64)
    }

    /// Adds two durations exactly.
    pub fn add(self, other: Timer) -> Timer {
        Timer::normalize(self.seconds + other.seconds, self.fraction + other.fraction)
    }

    /// Compares two durations; returns `-1`, `0`, or `1`.
    pub fn compare(self, other: Timer) -> i32 {
        match self.seconds.cmp(&other.seconds) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Greater => 1,
            std::cmp::Ordering::Equal => match self.fraction.cmp(&other.fraction) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Greater => 1,
                std::cmp::Ordering::Equal => 0,
            },
        }
    }

    /// Returns the total duration expressed as a whole-number count at the
    /// given resolution (truncating any remainder finer than the
    /// resolution), e.g. `count(Resolution::Milliseconds)`.
    pub fn count(self, resolution: Resolution) -> i64 {
        match resolution {
            Resolution::Hours => self.seconds / 3600,
            Resolution::Minutes => self.seconds / 60,
            Resolution::Seconds => self.seconds,
            Resolution::Deciseconds => self.seconds * 10 + self.fraction * 10 / UNITS_PER_SECOND,
            Resolution::Centiseconds => self.seconds * 100 + self.fraction * 100 / UNITS_PER_SECOND,
            Resolution::Milliseconds => {
                self.seconds * 1000 + self.fraction * 1000 / UNITS_PER_SECOND
            }
        }
    }

    /// Returns `(numerator, denominator)` such that `numerator/denominator`
    /// equals the fractional part of this duration, reduced to lowest terms
    /// (mirrors `mad_timer_fraction`).
    pub fn fraction(self, denominator: i64) -> i64 {
        if denominator == UNITS_PER_SECOND {
            self.fraction
        }
        else {
            ((self.fraction as i128) * (denominator as i128) / (UNITS_PER_SECOND as i128)) as i64
        }
    }

    /// Formats as `hh:mm:ss` with an optional fractional suffix when
    /// `resolution` is finer than seconds (e.g. `ss.t` for deciseconds).
    pub fn str(self, resolution: Resolution) -> String {
        let total_seconds = self.seconds;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        match resolution {
            Resolution::Hours | Resolution::Minutes | Resolution::Seconds => {
                format!("{:02}:{:02}:{:02}", hours, minutes, secs)
            }
            Resolution::Deciseconds => {
                let tenths = self.fraction * 10 / UNITS_PER_SECOND;
                format!("{:02}:{:02}:{:02}.{:01}", hours, minutes, secs, tenths)
            }
            Resolution::Centiseconds => {
                let hundredths = self.fraction * 100 / UNITS_PER_SECOND;
                format!("{:02}:{:02}:{:02}.{:02}", hours, minutes, secs, hundredths)
            }
            Resolution::Milliseconds => {
                let millis = self.fraction * 1000 / UNITS_PER_SECOND;
                format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration_44100_matches_exactly() {
        let d = Timer::frame_duration(36, 44100);
        // 1152 / 44100 s exactly.
        assert_eq!(d.seconds, 0);
        assert_eq!(d.fraction, UNITS_PER_SECOND * 1152 / 44100);
    }

    #[test]
    fn addition_is_associative_and_commutative() {
        let a = Timer::frame_duration(36, 44100);
        let b = Timer::frame_duration(18, 22050);
        let c = Timer::frame_duration(12, 32000);

        let ab_c = a.add(b).add(c);
        let a_bc = a.add(b.add(c));
        assert_eq!(ab_c, a_bc);

        let ba = b.add(a);
        assert_eq!(a.add(b), ba);
    }

    #[test]
    fn sum_of_n_frame_durations_equals_total() {
        let per_frame = Timer::frame_duration(36, 44100);
        let mut total = Timer::ZERO;
        for _ in 0..10 {
            total = total.add(per_frame);
        }

        let direct = Timer::set(0, 1152 * 10, 44100);
        assert_eq!(total, direct);
    }

    #[test]
    fn compare_orders_correctly() {
        let a = Timer::set(1, 0, 1);
        let b = Timer::set(2, 0, 1);
        assert_eq!(a.compare(b), -1);
        assert_eq!(b.compare(a), 1);
        assert_eq!(a.compare(a), 0);
    }

    #[test]
    fn reduce_handles_arbitrary_denominator() {
        // 1/37 isn't a common sample rate; the generic path must still
        // produce a sane, monotonic fraction.
        let t = Timer::set(0, 1, 37);
        assert!(t.fraction > 0 && t.fraction < UNITS_PER_SECOND);
    }
}
