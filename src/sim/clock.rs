use chrono::{NaiveDateTime, TimeDelta};

use crate::error::SimError;

/// A simulation clock that only moves forward.
///
/// The `SimClock` tracks the current interval start and the one before it,
/// so that the length of the interval just entered is always available via
/// [`SimClock::elapsed`].
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use solar_savings::sim::clock::SimClock;
///
/// let t0 = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let mut clock = SimClock::new(t0);
/// clock.advance(t0 + chrono::TimeDelta::minutes(15)).unwrap();
/// assert_eq!(clock.elapsed(), chrono::TimeDelta::minutes(15));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimClock {
    /// Start of the interval currently being simulated.
    current: NaiveDateTime,
    /// Value of `current` before the last advance.
    previous: NaiveDateTime,
}

impl SimClock {
    /// Creates a clock resting at `origin`.
    ///
    /// Until the first advance the elapsed duration is zero. Seed `origin`
    /// one interval before the first record to give that record its full
    /// duration.
    pub fn new(origin: NaiveDateTime) -> Self {
        Self {
            current: origin,
            previous: origin,
        }
    }

    /// Moves the clock to `new_time`.
    ///
    /// Setting the current time again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimeOrder`] if `new_time` is earlier than the
    /// current time.
    pub fn advance(&mut self, new_time: NaiveDateTime) -> Result<(), SimError> {
        if new_time < self.current {
            return Err(SimError::TimeOrder {
                current: self.current,
                requested: new_time,
            });
        }
        if new_time > self.current {
            self.previous = self.current;
            self.current = new_time;
        }
        Ok(())
    }

    pub fn current(&self) -> NaiveDateTime {
        self.current
    }

    pub fn previous(&self) -> NaiveDateTime {
        self.previous
    }

    /// Duration between the last two distinct clock positions.
    pub fn elapsed(&self) -> TimeDelta {
        self.current - self.previous
    }
}
