//! Scoped timing for per-tick tracing.
//!
//! A [`TimingGuard`] records when it was created and logs the elapsed time when it
//! is dropped, so early returns and `?` are timed too. Nothing is logged unless the
//! requested level is enabled for the `blob_vision::telemetry` target.

use log::{Level, log, log_enabled};
use std::borrow::Cow;
use std::time::{Duration, Instant};

const TARGET: &str = "blob_vision::telemetry";

pub struct TimingGuard {
    label: Cow<'static, str>,
    level: Level,
    start: Instant,
    active: bool,
}

impl TimingGuard {
    /// Logs now (when enabled) and returns the elapsed time.
    pub fn finish(mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if self.active {
            log!(target: TARGET, self.level, "{} completed in {:.2?}", self.label, elapsed);
            self.active = false;
        }
        elapsed
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if self.active {
            log!(target: TARGET, self.level, "{} completed in {:.2?}", self.label, self.start.elapsed());
        }
    }
}

pub fn timing_guard(label: impl Into<Cow<'static, str>>, level: Level) -> TimingGuard {
    TimingGuard {
        label: label.into(),
        level,
        start: Instant::now(),
        active: log_enabled!(target: TARGET, level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_returns_elapsed_time() {
        let guard = timing_guard("test", Level::Trace);
        std::thread::sleep(Duration::from_millis(2));
        assert!(guard.finish() >= Duration::from_millis(2));
    }

    #[test]
    fn inactive_without_a_logger() {
        // No logger is installed in unit tests, so every level is filtered out.
        let guard = timing_guard("quiet", Level::Error);
        assert!(!guard.active);
        assert!(guard.finish() < Duration::from_secs(1));
    }
}
