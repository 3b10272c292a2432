//! Elapsed-time bookkeeping over platform absolute time.

/// Tracks seconds elapsed since `start`.
///
/// The clock does no time sourcing of its own; callers feed it the
/// platform's absolute time, which keeps it usable with the scripted
/// headless platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct Clock {
    start_time: f64,
    elapsed: f64,
}

impl Clock {
    /// A stopped clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restarts the clock at `now`.
    pub fn start(&mut self, now: f64) {
        self.start_time = now;
        self.elapsed = 0.0;
    }

    /// Recomputes the elapsed time against `now`.
    pub fn update(&mut self, now: f64) {
        self.elapsed = now - self.start_time;
    }

    /// Seconds between the last `start` and the last `update`.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn elapsed_tracks_updates_since_start() {
        let mut clock = Clock::new();
        clock.start(100.0);
        assert_relative_eq!(clock.elapsed(), 0.0);

        clock.update(100.25);
        assert_relative_eq!(clock.elapsed(), 0.25);

        clock.update(101.5);
        assert_relative_eq!(clock.elapsed(), 1.5);
    }

    #[test]
    fn restart_rebases_the_epoch() {
        let mut clock = Clock::new();
        clock.start(10.0);
        clock.update(12.0);

        clock.start(50.0);
        clock.update(50.5);
        assert_relative_eq!(clock.elapsed(), 0.5);
    }
}
