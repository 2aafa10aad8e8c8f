//! Polling engine
//!
//! Drives a caller-supplied attempt function until it yields a final outcome,
//! the deadline passes, or the caller cancels. Both the job wait and the
//! device authorization wait run on top of [`poll_until`].
//!
//! The interval between attempts only ever grows: a rate-limit reply may raise
//! it but never lower it. Sleeps race against the cancellation token, so a
//! cancel takes effect without waiting out the current interval.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ClientError;

/// Classified result of one attempt
#[derive(Debug)]
pub enum PollOutcome<T, F> {
    /// Final value; polling stops
    Success(T),
    /// Not done yet; retry after the current interval
    Pending,
    /// Not done yet and the server asked to slow down, optionally to a new interval
    RateLimited(Option<Duration>),
    /// Final failure reported by the server; polling stops
    TerminalFailure(F),
    /// The server could not be reached or replied with garbage; polling stops
    TransportError(ClientError),
}

/// Progress notifications for the observer hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    /// An attempt is about to be made (1-based)
    Attempt { attempt: u32 },
    /// The attempt reported that the operation is still pending
    Pending { attempt: u32 },
    /// The attempt was rate limited; `interval` is the interval now in effect
    RateLimited { attempt: u32, interval: Duration },
    /// The engine is about to sleep before the next attempt
    Sleeping { interval: Duration },
}

/// Why polling ended without a value
#[derive(Debug, Error)]
pub enum PollError<F> {
    /// The server reported a final failure
    #[error("{0}")]
    Terminal(F),

    /// Transport failure while talking to the server
    #[error(transparent)]
    Transport(ClientError),

    /// The deadline passed before the server reported a final state
    #[error("timed out after {waited:?}: the deadline passed before the server reported a final state")]
    Timeout { waited: Duration },

    /// The caller cancelled the wait
    #[error("cancelled before the server reported a final state")]
    Cancelled,
}

/// Interval and deadline for one polling session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Initial delay between attempts
    pub interval: Duration,
    /// No attempt is made, and no sleep started, that would end past this point
    pub deadline: Option<Instant>,
}

impl PollPolicy {
    /// Poll every `interval` with no deadline
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline `timeout` from now
    ///
    /// A timeout too large to represent leaves the policy unbounded.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Whether sleeping `interval` from `now` would end past the deadline
    fn crosses_deadline(&self, now: Instant, interval: Duration) -> bool {
        match self.deadline {
            None => false,
            Some(deadline) => now
                .checked_add(interval)
                .is_none_or(|wake| wake > deadline),
        }
    }
}

/// Run `attempt` until it succeeds or fails for good
///
/// # Arguments
/// * `policy` - Initial interval and optional deadline
/// * `cancel` - Checked before every attempt and raced against every sleep
/// * `attempt` - Performs one request and classifies the reply
/// * `on_event` - Observer called for every attempt, pending reply, rate limit and sleep
///
/// # Returns
/// The value of the first [`PollOutcome::Success`], or the reason polling stopped
pub async fn poll_until<T, F, A, Fut, O>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut attempt: A,
    mut on_event: O,
) -> Result<T, PollError<F>>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = PollOutcome<T, F>>,
    O: FnMut(&PollEvent),
{
    let started = Instant::now();
    let mut interval = policy.interval;
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        if policy.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(PollError::Timeout {
                waited: started.elapsed(),
            });
        }

        attempts += 1;
        on_event(&PollEvent::Attempt { attempt: attempts });

        match attempt().await {
            PollOutcome::Success(value) => return Ok(value),
            PollOutcome::TerminalFailure(failure) => return Err(PollError::Terminal(failure)),
            PollOutcome::TransportError(err) => return Err(PollError::Transport(err)),
            PollOutcome::Pending => {
                on_event(&PollEvent::Pending { attempt: attempts });
            }
            PollOutcome::RateLimited(requested) => {
                if let Some(requested) = requested {
                    interval = interval.max(requested);
                }
                debug!("Rate limited on attempt {}, interval now {:?}", attempts, interval);
                on_event(&PollEvent::RateLimited {
                    attempt: attempts,
                    interval,
                });
            }
        }

        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        if policy.crosses_deadline(Instant::now(), interval) {
            return Err(PollError::Timeout {
                waited: started.elapsed(),
            });
        }

        on_event(&PollEvent::Sleeping { interval });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::{Ready, ready};

    type Outcome = PollOutcome<&'static str, String>;

    fn scripted(outcomes: Vec<Outcome>) -> impl FnMut() -> Ready<Outcome> {
        let mut outcomes = VecDeque::from(outcomes);
        move || ready(outcomes.pop_front().expect("attempt made after the script ended"))
    }

    fn sleeps(events: &[PollEvent]) -> Vec<Duration> {
        events
            .iter()
            .filter_map(|e| match e {
                PollEvent::Sleeping { interval } => Some(*interval),
                _ => None,
            })
            .collect()
    }

    fn attempts(events: &[PollEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, PollEvent::Attempt { .. }))
            .count()
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_never_shrinks_interval() {
        let mut events = Vec::new();
        let result = poll_until(
            &PollPolicy::new(secs(5)),
            &CancellationToken::new(),
            scripted(vec![
                PollOutcome::RateLimited(Some(secs(10))),
                PollOutcome::RateLimited(Some(secs(3))),
                PollOutcome::RateLimited(Some(secs(20))),
                PollOutcome::RateLimited(None),
                PollOutcome::Pending,
                PollOutcome::RateLimited(Some(secs(15))),
                PollOutcome::Success("done"),
            ]),
            |e| events.push(*e),
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        let slept = sleeps(&events);
        assert_eq!(
            slept,
            vec![secs(10), secs(10), secs(20), secs(20), secs(20), secs(20)]
        );
        assert!(slept.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_stops_polling() {
        let mut events = Vec::new();
        let started = Instant::now();

        let result = poll_until(
            &PollPolicy::new(secs(5)),
            &CancellationToken::new(),
            scripted(vec![
                PollOutcome::Pending,
                PollOutcome::Pending,
                PollOutcome::Success("done"),
            ]),
            |e| events.push(*e),
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts(&events), 3);
        assert_eq!(sleeps(&events), vec![secs(5), secs(5)]);
        assert_eq!(started.elapsed(), secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_stops_polling() {
        let mut calls = 0;
        let result: Result<(), PollError<String>> = poll_until(
            &PollPolicy::new(secs(1)),
            &CancellationToken::new(),
            || {
                calls += 1;
                ready(if calls < 2 {
                    PollOutcome::Pending
                } else {
                    PollOutcome::TerminalFailure("rejected".to_string())
                })
            },
            |_| {},
        )
        .await;

        match result {
            Err(PollError::Terminal(reason)) => assert_eq!(reason, "rejected"),
            other => panic!("expected terminal failure, got {:?}", other),
        }
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), PollError<String>> = poll_until(
            &PollPolicy::new(secs(1)),
            &CancellationToken::new(),
            || {
                calls += 1;
                ready(PollOutcome::TransportError(ClientError::ParseError(
                    "truncated body".to_string(),
                )))
            },
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(PollError::Transport(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_respected() {
        let started = Instant::now();
        let deadline = started + secs(12);
        let mut attempted_at = Vec::new();

        let result: Result<(), PollError<String>> = poll_until(
            &PollPolicy::new(secs(5)).with_deadline(deadline),
            &CancellationToken::new(),
            || {
                attempted_at.push(Instant::now());
                ready(PollOutcome::Pending)
            },
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(PollError::Timeout { .. })));
        assert_eq!(attempted_at.len(), 3);
        assert!(attempted_at.iter().all(|at| *at <= deadline));
        assert!(Instant::now() <= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_makes_no_attempt() {
        let mut calls = 0;
        let result: Result<(), PollError<String>> = poll_until(
            &PollPolicy::new(secs(5)).with_deadline(Instant::now()),
            &CancellationToken::new(),
            || {
                calls += 1;
                ready(PollOutcome::Pending)
            },
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(PollError::Timeout { .. })));
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(secs(1)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let mut calls = 0;
        let result: Result<(), PollError<String>> = poll_until(
            &PollPolicy::new(secs(60)),
            &cancel,
            || {
                calls += 1;
                ready(PollOutcome::Pending)
            },
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(PollError::Cancelled)));
        assert_eq!(calls, 1);
        assert!(started.elapsed() < secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_makes_no_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut calls = 0;
        let result: Result<(), PollError<String>> = poll_until(
            &PollPolicy::new(secs(5)),
            &cancel,
            || {
                calls += 1;
                ready(PollOutcome::Pending)
            },
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(PollError::Cancelled)));
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_rate_limit_interval_times_out() {
        let deadline = Instant::now() + secs(900);
        let result = poll_until(
            &PollPolicy::new(secs(5)).with_deadline(deadline),
            &CancellationToken::new(),
            scripted(vec![PollOutcome::RateLimited(Some(secs(i64::MAX as u64)))]),
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(PollError::Timeout { .. })));
        assert!(Instant::now() <= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_is_unbounded() {
        let policy = PollPolicy::new(secs(5)).with_timeout(Duration::MAX);
        assert_eq!(policy.deadline, None);

        let result = poll_until(
            &policy,
            &CancellationToken::new(),
            scripted(vec![PollOutcome::Pending, PollOutcome::Success("done")]),
            |_| {},
        )
        .await;

        assert_eq!(result.unwrap(), "done");
    }

    #[test]
    fn test_timeout_message_names_the_deadline() {
        let err: PollError<String> = PollError::Timeout { waited: secs(30) };
        assert!(err.to_string().contains("deadline"));
    }
}
