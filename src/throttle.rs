use chrono::{DateTime, Duration, Utc};

/// Single "next eligible time" gate. One sample is let through per interval.
#[derive(Debug, Clone)]
pub struct ThrottleClock {
    interval: Duration,
    next_eligible: Option<DateTime<Utc>>,
}

impl ThrottleClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_eligible: None,
        }
    }

    /// True if an event arriving at `now` may be scored.
    #[inline]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        match self.next_eligible {
            None => true, // nothing scored yet
            Some(next) => now >= next,
        }
    }

    /// Close the gate until `now + interval`, saturating at the latest
    /// representable time.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        let next = now
            .checked_add_signed(self.interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.next_eligible = Some(next);
    }

    pub fn next_eligible(&self) -> Option<DateTime<Utc>> {
        self.next_eligible
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
