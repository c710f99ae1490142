//! Frame-rate limiter.
//!
//! Decides which dequeued frames are persisted, bounding the persisted rate
//! from above. Identical consecutive frames are never dropped for being
//! identical; a static screen still produces a steady low-rate stream.

/// Per-session timestamp tracker.
///
/// Reset whenever a fresh diary file begins: the first frame written to a
/// new file is always accepted and establishes the new baseline.
pub struct RateLimiter {
    min_interval_nanos: u64,
    last_written_nanos: Option<u64>,
}

impl RateLimiter {
    /// Limiter admitting at most one frame per `min_interval_nanos`.
    pub fn new(min_interval_nanos: u64) -> Self {
        Self {
            min_interval_nanos,
            last_written_nanos: None,
        }
    }

    /// Decide whether a frame captured at `timestamp_nanos` is persisted.
    ///
    /// Returns the elapsed nanoseconds since the previously persisted frame
    /// when accepted (0 for the baseline frame), or `None` when the frame
    /// must be dropped entirely.
    pub fn accept(&mut self, timestamp_nanos: u64) -> Option<u64> {
        match self.last_written_nanos {
            None => {
                self.last_written_nanos = Some(timestamp_nanos);
                Some(0)
            }
            Some(last) => {
                let elapsed = timestamp_nanos.saturating_sub(last);
                if elapsed >= self.min_interval_nanos {
                    self.last_written_nanos = Some(timestamp_nanos);
                    Some(elapsed)
                } else {
                    None
                }
            }
        }
    }

    /// Forget the baseline; the next frame is accepted unconditionally.
    pub fn reset(&mut self) {
        self.last_written_nanos = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const INTERVAL: u64 = 1_000_000_000 / 30;

    #[test]
    fn test_first_frame_always_accepted() {
        let mut limiter = RateLimiter::new(INTERVAL);
        assert_eq!(limiter.accept(123_456), Some(0));
    }

    #[test]
    fn test_too_fast_dropped() {
        let mut limiter = RateLimiter::new(INTERVAL);
        limiter.accept(0);
        assert_eq!(limiter.accept(INTERVAL / 2), None);
        // baseline did not advance on the dropped frame
        assert_eq!(limiter.accept(INTERVAL), Some(INTERVAL));
    }

    #[test]
    fn test_irregular_cadence_reported_exactly() {
        let mut limiter = RateLimiter::new(INTERVAL);
        limiter.accept(0);
        assert_eq!(limiter.accept(5 * INTERVAL), Some(5 * INTERVAL));
        assert_eq!(limiter.accept(6 * INTERVAL + 17), Some(INTERVAL + 17));
    }

    #[test]
    fn test_reset_establishes_new_baseline() {
        let mut limiter = RateLimiter::new(INTERVAL);
        limiter.accept(0);
        assert_eq!(limiter.accept(1), None);
        limiter.reset();
        assert_eq!(limiter.accept(2), Some(0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// For any timestamp sequence spanning D seconds, accepted frames
        /// never exceed ceil(D * rate) + 1.
        #[test]
        fn prop_rate_bound(mut deltas in prop::collection::vec(0u64..200_000_000, 1..200)) {
            let mut limiter = RateLimiter::new(INTERVAL);
            let mut ts = 0u64;
            let mut accepted = 0u64;
            let mut timestamps = vec![0u64];
            for d in deltas.drain(..) {
                ts += d;
                timestamps.push(ts);
            }
            for &t in &timestamps {
                if limiter.accept(t).is_some() {
                    accepted += 1;
                }
            }
            let duration = *timestamps.last().unwrap();
            let bound = duration.div_ceil(INTERVAL) + 1;
            prop_assert!(accepted <= bound, "accepted {} > bound {}", accepted, bound);
        }
    }
}
