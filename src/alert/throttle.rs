//! Rate limiting for externally-visible camera alerts

use std::time::{Duration, Instant};

/// Decides whether an externally-visible alert may fire
///
/// One instance per camera. The throttle persists across reconnection
/// attempts, so a flapping camera produces at most one alert burst per
/// cooldown window. `should_fire` and `mark_fired` form a check-then-act
/// pair; a single task owns the instance, so no locking is needed.
#[derive(Debug)]
pub struct NotificationThrottle {
    last_fired: Option<Instant>,
    cooldown: Duration,
}

impl NotificationThrottle {
    /// Create a throttle with the given cooldown window
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_fired: None,
            cooldown,
        }
    }

    /// True if an alert may fire at `now`
    ///
    /// Fires when no alert has ever fired, or when more than the cooldown
    /// has elapsed since the last one. A `true` result must be followed by
    /// `mark_fired` once the alert has been emitted.
    pub fn should_fire(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.duration_since(last) > self.cooldown,
        }
    }

    /// Record that an alert fired at `now`
    pub fn mark_fired(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }

    /// The configured cooldown window
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Default for NotificationThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_alert_fires() {
        let throttle = NotificationThrottle::new(Duration::from_secs(300));
        assert!(throttle.should_fire(Instant::now()));
    }

    #[test]
    fn test_suppressed_within_cooldown() {
        let mut throttle = NotificationThrottle::new(Duration::from_secs(300));
        let t0 = Instant::now();

        assert!(throttle.should_fire(t0));
        throttle.mark_fired(t0);

        assert!(!throttle.should_fire(t0 + Duration::from_secs(1)));
        assert!(!throttle.should_fire(t0 + Duration::from_secs(299)));
        // boundary: exactly the cooldown is still suppressed
        assert!(!throttle.should_fire(t0 + Duration::from_secs(300)));
    }

    #[test]
    fn test_fires_again_after_cooldown() {
        let mut throttle = NotificationThrottle::new(Duration::from_secs(300));
        let t0 = Instant::now();

        throttle.mark_fired(t0);
        let later = t0 + Duration::from_secs(301);
        assert!(throttle.should_fire(later));

        throttle.mark_fired(later);
        assert!(!throttle.should_fire(later + Duration::from_secs(10)));
    }

    #[test]
    fn test_at_most_one_firing_per_window() {
        let mut throttle = NotificationThrottle::new(Duration::from_secs(60));
        let t0 = Instant::now();
        let mut fired = 0;

        // a failure streak probing every second for two minutes
        for s in 0..120 {
            let now = t0 + Duration::from_secs(s);
            if throttle.should_fire(now) {
                throttle.mark_fired(now);
                fired += 1;
            }
        }

        assert_eq!(fired, 2);
    }
}
