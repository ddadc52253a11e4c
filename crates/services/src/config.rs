use std::env;
use std::time::Duration;

use chrono::{FixedOffset, Local, Offset};
use lesson_core::unlock::LessonUnlockPolicy;
use tracing::warn;

const DEFAULT_FLUSH_SECS: u64 = 10;
const DEFAULT_RESUME_TAIL_SECS: u64 = 10;

/// Runtime knobs for lesson tracking.
///
/// The 1 Hz sampling cadence is fixed because watch time is counted in whole
/// seconds; see [`crate::watch_time::SAMPLE_INTERVAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    flush_interval: Duration,
    resume_tail: Duration,
    utc_offset: FixedOffset,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_SECS),
            resume_tail: Duration::from_secs(DEFAULT_RESUME_TAIL_SECS),
            utc_offset: Local::now().offset().fix(),
        }
    }
}

impl TrackerConfig {
    /// Defaults overridden by `LESSON_FLUSH_SECS`, `LESSON_RESUME_TAIL_SECS`
    /// and `LESSON_UTC_OFFSET_MINUTES`. Unparseable values are logged and
    /// ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = read_env::<u64>("LESSON_FLUSH_SECS").filter(|s| *s > 0) {
            config.flush_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env::<u64>("LESSON_RESUME_TAIL_SECS") {
            config.resume_tail = Duration::from_secs(secs);
        }
        if let Some(minutes) = read_env::<i32>("LESSON_UTC_OFFSET_MINUTES") {
            match minutes.checked_mul(60).and_then(FixedOffset::east_opt) {
                Some(offset) => config.utc_offset = offset,
                None => warn!(minutes, "ignoring out-of-range LESSON_UTC_OFFSET_MINUTES"),
            }
        }

        config
    }

    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    #[must_use]
    pub fn with_resume_tail(mut self, tail: Duration) -> Self {
        self.resume_tail = tail;
        self
    }

    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    #[must_use]
    pub fn resume_tail(&self) -> Duration {
        self.resume_tail
    }

    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    #[must_use]
    pub fn unlock_policy(&self) -> LessonUnlockPolicy {
        LessonUnlockPolicy::new(self.utc_offset)
    }
}

fn read_env<T: std::str::FromStr>(key: &'static str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_flush_and_resume_windows() {
        let config = TrackerConfig::default();
        assert_eq!(config.flush_interval(), Duration::from_secs(10));
        assert_eq!(config.resume_tail(), Duration::from_secs(10));
    }

    #[test]
    fn builders_override_fields() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let config = TrackerConfig::default()
            .with_flush_interval(Duration::from_secs(5))
            .with_resume_tail(Duration::from_secs(3))
            .with_utc_offset(offset);

        assert_eq!(config.flush_interval(), Duration::from_secs(5));
        assert_eq!(config.resume_tail(), Duration::from_secs(3));
        assert_eq!(config.unlock_policy().offset(), offset);
    }
}
