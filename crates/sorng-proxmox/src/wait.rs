//! Cancellable polling with an interval and a deadline.

use crate::error::ProxmoxResult;

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

impl PollOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout, ..Self::default() }
    }
}

/// How a wait ended. `last` is the most recent fetched value, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    Ready(T),
    TimedOut { last: Option<T> },
    Cancelled { last: Option<T> },
}

impl<T> WaitOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }

    /// Latest observed value regardless of how the wait ended.
    pub fn into_last(self) -> Option<T> {
        match self {
            Self::Ready(v) => Some(v),
            Self::TimedOut { last } | Self::Cancelled { last } => last,
        }
    }
}

/// Run `fetch` every `options.interval` until `done` accepts its result,
/// the deadline passes, or `cancel` fires. A fetch still in flight at the
/// deadline is dropped. A fetch error ends the wait.
pub async fn poll_until<T, F, Fut, D>(
    options: PollOptions,
    cancel: &CancellationToken,
    mut fetch: F,
    done: D,
) -> ProxmoxResult<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProxmoxResult<T>>,
    D: Fn(&T) -> bool,
{
    let deadline = Instant::now() + options.timeout;
    let mut last = None;

    loop {
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::Cancelled { last });
        }

        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(WaitOutcome::Cancelled { last }),
            value = fetch() => value?,
            _ = sleep_until(deadline) => return Ok(WaitOutcome::TimedOut { last }),
        };
        if done(&value) {
            return Ok(WaitOutcome::Ready(value));
        }
        last = Some(value);

        let now = Instant::now();
        if now >= deadline {
            return Ok(WaitOutcome::TimedOut { last });
        }
        let pause = options.interval.min(deadline - now);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(WaitOutcome::Cancelled { last }),
            _ = sleep(pause) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProxmoxError, ProxmoxErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ready_on_third_fetch() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let outcome = poll_until(
            PollOptions::default(),
            &cancel,
            move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) },
            |n: &usize| *n == 3,
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Ready(3));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_last_value() {
        let cancel = CancellationToken::new();
        let opts = PollOptions {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        };
        let started = Instant::now();

        let outcome = poll_until(opts, &cancel, || async { Ok("running") }, |s: &&str| *s == "stopped")
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut { last: Some("running") });
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_stops_at_the_deadline() {
        let cancel = CancellationToken::new();
        let opts = PollOptions {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
        };
        let started = Instant::now();

        let outcome = tokio::time::timeout(
            Duration::from_secs(3600),
            poll_until(
                opts,
                &cancel,
                || std::future::pending::<ProxmoxResult<u8>>(),
                |_| true,
            ),
        )
        .await
        .expect("wait must end at its own deadline")
        .unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut { last: None });
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_keeps_the_previous_value() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let cancel = CancellationToken::new();
        let opts = PollOptions {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(3),
        };

        let outcome = poll_until(
            opts,
            &cancel,
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n > 0 {
                    sleep(Duration::from_secs(60)).await;
                }
                Ok(n)
            },
            |_: &usize| false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut { last: Some(0) });
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });
        let started = Instant::now();

        let outcome = poll_until(
            PollOptions::default(),
            &cancel,
            || async { Ok(0u8) },
            |_| false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Cancelled { last: Some(0) });
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn already_cancelled_never_fetches() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let outcome = poll_until(
            PollOptions::default(),
            &cancel,
            move || {
                let counter = counter.clone();
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) }
            },
            |_| true,
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Cancelled { last: None });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_error_propagates() {
        let cancel = CancellationToken::new();
        let err = poll_until(
            PollOptions::default(),
            &cancel,
            || async { Err::<(), _>(ProxmoxError::transport("refused")) },
            |_| true,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ProxmoxErrorKind::Transport);
    }

    #[test]
    fn outcome_accessors() {
        assert_eq!(WaitOutcome::Ready(1).ready(), Some(1));
        assert!(!WaitOutcome::<i32>::TimedOut { last: Some(2) }.is_ready());
        assert_eq!(WaitOutcome::Cancelled { last: Some(3) }.into_last(), Some(3));
    }
}
