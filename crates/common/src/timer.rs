use std::time::Duration;

/// Repeating timer driven by the host loop.
///
/// The host passes the current time to [`IntervalTimer::due`] once per frame;
/// the timer reports how many whole periods have elapsed since the last call.
/// Cancelling disarms the timer permanently.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period: Duration,
    next_due: Option<Duration>,
}

impl IntervalTimer {
    /// Arm a timer whose first tick falls one `period` after `now`.
    pub fn start(period: Duration, now: Duration) -> Self {
        assert!(!period.is_zero(), "interval period must be non-zero");
        Self {
            period,
            next_due: Some(now + period),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the timer can still fire.
    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Time of the next tick, if armed.
    pub fn next_due(&self) -> Option<Duration> {
        self.next_due
    }

    /// Number of ticks that became due at or before `now`. Each tick is
    /// reported once; the schedule advances by whole periods so a stalled
    /// host catches up tick by tick rather than skipping.
    pub fn due(&mut self, now: Duration) -> u32 {
        let Some(mut next) = self.next_due else {
            return 0;
        };
        let mut ticks = 0;
        while next <= now {
            ticks += 1;
            next += self.period;
        }
        self.next_due = Some(next);
        ticks
    }

    /// Disarm the timer. Idempotent.
    pub fn cancel(&mut self) {
        self.next_due = None;
    }
}

/// Coalesces a burst of values into the last one, released after a quiet window.
///
/// Every [`Debouncer::push`] replaces the pending value and restarts the
/// window. [`Debouncer::poll`] hands the value out once the window has passed
/// with no further pushes.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Duration)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replace the pending value and restart the quiet window at `now`.
    pub fn push(&mut self, value: T, now: Duration) {
        self.pending = Some((value, now + self.window));
    }

    /// Release the pending value if its window elapsed by `now`.
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    /// Release the pending value immediately, regardless of the window.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    /// Drop the pending value without releasing it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Deadline of the pending value, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|(_, d)| *d)
    }
}
