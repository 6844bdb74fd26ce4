//! Timing configuration for a scheduled task.

use std::time::Duration;

/// When, how often, and for how long a task may run.
///
/// Delays are plain durations. Callers convert from game units (for
/// example "seconds remaining divided by assigned survivors") before
/// building the config; the scheduler never sees those units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskConfig {
    /// Delay before the first execution. Zero runs as soon as scheduled.
    pub start_delay: Duration,

    /// Delay before each later execution. `None` runs once.
    pub repeat_interval: Option<Duration>,

    /// Cap on total executions of a repeating task. `None` repeats until
    /// stopped.
    pub max_repeats: Option<u32>,

    /// Cancels the task with `CancelReason::Timeout` once this much time
    /// has passed since scheduling. Only checked between executions.
    pub timeout: Option<Duration>,
}

impl TaskConfig {
    /// Smallest accepted repeat interval.
    pub const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(1);

    /// Runs once after `delay`.
    pub fn once_after(delay: Duration) -> Self {
        Self {
            start_delay: delay,
            ..Self::default()
        }
    }

    /// Runs after `start`, then every `every` until stopped.
    pub fn repeating(start: Duration, every: Duration) -> Self {
        Self {
            start_delay: start,
            repeat_interval: Some(every),
            ..Self::default()
        }
    }

    /// Clamp values that would make the runner spin or never run.
    ///
    /// Called by the scheduler for every task. Rules:
    /// - `repeat_interval` is at least [`Self::MIN_REPEAT_INTERVAL`].
    /// - `max_repeats` of zero becomes one.
    pub fn validated(mut self) -> Self {
        if let Some(every) = self.repeat_interval {
            self.repeat_interval = Some(every.max(Self::MIN_REPEAT_INTERVAL));
        }
        if self.max_repeats == Some(0) {
            tracing::warn!("max_repeats of 0 would never run, using 1");
            self.max_repeats = Some(1);
        }
        self
    }

    /// Whether another execution is allowed after `done` executions.
    pub(crate) fn allows_another(&self, done: u32) -> bool {
        match (self.repeat_interval, self.max_repeats) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(max)) => done < max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_runs_once_immediately() {
        let cfg = TaskConfig::default();
        assert_eq!(cfg.start_delay, Duration::ZERO);
        assert!(!cfg.allows_another(1));
    }

    #[test]
    fn test_allows_another_respects_max_repeats() {
        let cfg = TaskConfig {
            max_repeats: Some(3),
            ..TaskConfig::repeating(Duration::ZERO, Duration::from_secs(1))
        };
        assert!(cfg.allows_another(2));
        assert!(!cfg.allows_another(3));
    }

    #[test]
    fn test_validated_clamps_zero_interval_and_repeats() {
        let cfg = TaskConfig {
            max_repeats: Some(0),
            ..TaskConfig::repeating(Duration::ZERO, Duration::ZERO)
        }
        .validated();
        assert_eq!(cfg.repeat_interval, Some(TaskConfig::MIN_REPEAT_INTERVAL));
        assert_eq!(cfg.max_repeats, Some(1));
    }
}
