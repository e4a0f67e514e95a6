use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::clock::Clock;
use crate::error::{ReportError, Result};

/// State owned by a single report run.
///
/// Holds the clock handle, the provider call throttle and the execution
/// deadline. Each run creates its own, so concurrent runs never share
/// mutable state.
pub struct RunContext {
    clock: Arc<dyn Clock>,
    started: Duration,
    min_call_interval: Duration,
    next_call_at: Option<Duration>,
    deadline: Option<Duration>,
}

impl RunContext {
    /// `deadline` is measured from now
    pub fn new(
        clock: Arc<dyn Clock>,
        min_call_interval: Duration,
        deadline: Option<Duration>,
    ) -> Self {
        let started = clock.elapsed();
        Self {
            clock,
            started,
            min_call_interval,
            next_call_at: None,
            deadline,
        }
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed().saturating_sub(self.started)
    }

    pub fn deadline_reached(&self) -> bool {
        self.deadline.is_some_and(|d| self.elapsed() >= d)
    }

    /// Suspend for `duration`, failing fast if that would cross the deadline
    pub async fn wait(&mut self, duration: Duration) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if self.elapsed() + duration >= deadline {
                return Err(ReportError::Timeout {
                    last_completed: None,
                    elapsed: self.elapsed(),
                });
            }
        }
        if !duration.is_zero() {
            self.clock.sleep(duration).await;
        }
        Ok(())
    }

    /// Hold the next provider call until the throttle allows it
    pub async fn throttle(&mut self) -> Result<()> {
        let now = self.elapsed();
        if let Some(next) = self.next_call_at {
            if next > now {
                let delay = next - now;
                debug!("Throttling provider call for {:?}", delay);
                self.wait(delay).await?;
            }
        }
        self.next_call_at = Some(self.elapsed() + self.min_call_interval);
        Ok(())
    }

    /// Push the next permitted call out by a provider hint
    pub fn defer_calls(&mut self, by: Duration) {
        let candidate = self.elapsed() + by;
        if self.next_call_at.map_or(true, |next| candidate > next) {
            self.next_call_at = Some(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2024, 12, 18).unwrap()))
    }

    #[tokio::test]
    async fn test_throttle_spaces_calls() {
        let clock = clock();
        let mut ctx = RunContext::new(clock.clone(), Duration::from_millis(500), None);

        ctx.throttle().await.unwrap();
        ctx.throttle().await.unwrap();
        clock.advance(Duration::from_millis(200));
        ctx.throttle().await.unwrap();

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_millis(300)]
        );
    }

    #[tokio::test]
    async fn test_defer_calls_honors_longer_hint() {
        let clock = clock();
        let mut ctx = RunContext::new(clock.clone(), Duration::from_millis(100), None);

        ctx.throttle().await.unwrap();
        ctx.defer_calls(Duration::from_secs(5));
        ctx.defer_calls(Duration::from_secs(1));
        ctx.throttle().await.unwrap();

        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
    }

    #[tokio::test]
    async fn test_wait_fails_fast_before_deadline() {
        let clock = clock();
        clock.advance(Duration::from_secs(100));
        let mut ctx = RunContext::new(clock.clone(), Duration::ZERO, Some(Duration::from_secs(10)));

        ctx.wait(Duration::from_secs(4)).await.unwrap();
        let err = ctx.wait(Duration::from_secs(6)).await.unwrap_err();

        assert!(matches!(err, ReportError::Timeout { .. }));
        assert_eq!(ctx.elapsed(), Duration::from_secs(4));
        assert!(!ctx.deadline_reached());
    }
}
