use std::time::Duration;

use talkhead_core::PollDelay;

/// Timeouts, cadence and retry budgets for everything that talks to the render service.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub connect_timeout: Duration,
    /// Per-call limit for submit, status and cancel requests.
    pub request_timeout: Duration,
    pub download_timeout: Duration,
    pub poll_interval: Duration,
    /// Consecutive failed status queries retried before polling gives up.
    pub poll_retry_budget: u32,
    pub retry_backoff: Duration,
    pub retry_backoff_max: Duration,
    pub download_retries: u32,
    pub redirect_limit: usize,
    pub max_artifact_bytes: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
            poll_retry_budget: 4,
            retry_backoff: Duration::from_secs(1),
            retry_backoff_max: Duration::from_secs(8),
            download_retries: 3,
            redirect_limit: 5,
            max_artifact_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

impl RenderSettings {
    pub fn delay_for(&self, delay: PollDelay) -> Duration {
        match delay {
            PollDelay::Immediate => Duration::ZERO,
            PollDelay::Interval => self.poll_interval,
            PollDelay::Backoff { attempt } => self.backoff(attempt),
        }
    }

    /// Doubles from `retry_backoff` on every attempt, capped at `retry_backoff_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_backoff
            .saturating_mul(factor)
            .min(self.retry_backoff_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let settings = RenderSettings::default();
        assert_eq!(settings.backoff(1), Duration::from_secs(1));
        assert_eq!(settings.backoff(2), Duration::from_secs(2));
        assert_eq!(settings.backoff(3), Duration::from_secs(4));
        assert_eq!(settings.backoff(4), Duration::from_secs(8));
        assert_eq!(settings.backoff(40), Duration::from_secs(8));
    }

    #[test]
    fn delays_follow_schedule() {
        let settings = RenderSettings::default();
        assert_eq!(settings.delay_for(PollDelay::Immediate), Duration::ZERO);
        assert_eq!(settings.delay_for(PollDelay::Interval), Duration::from_secs(5));
        assert_eq!(
            settings.delay_for(PollDelay::Backoff { attempt: 2 }),
            Duration::from_secs(2)
        );
    }
}
