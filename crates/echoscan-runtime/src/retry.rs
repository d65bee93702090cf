//! [`RetryPolicy`] – reconnect strategy for telemetry sources.
//!
//! A policy is a plain value: how many connect attempts are allowed and how
//! long to wait between them.  [`connect_with_retry`] applies it to a
//! [`TelemetrySource`], racing every wait against the shutdown signal so a
//! Ctrl-C never has to sit out a reconnect delay.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use echoscan_runtime::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1), 2.0)
//!     .with_max_attempts(4);
//!
//! assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
//! assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
//! assert_eq!(policy.delay_for(3), Some(Duration::from_millis(400)));
//! assert_eq!(policy.delay_for(4), None); // budget spent
//! ```

use std::time::Duration;

use echoscan_middleware::TelemetrySource;
use echoscan_types::ScanError;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

/// Reconnect delay used when nothing else is configured.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// RetryPolicy
// ─────────────────────────────────────────────────────────────────────────────

/// Bounded or unbounded retry schedule.
///
/// The default retries forever with a fixed [`DEFAULT_RETRY_DELAY`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Consecutive failed attempts allowed before giving up; `None` means
    /// unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Wait after the first failure.
    #[serde(rename = "initial_delay_ms", with = "millis")]
    pub initial_delay: Duration,
    /// Upper bound on any single wait.
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
    /// Growth factor applied per further failure (`1.0` = fixed delay).
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Unbounded retries with a constant `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Unbounded retries whose delay grows by `multiplier`, capped at `max`.
    pub fn exponential(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: None,
            initial_delay: initial,
            max_delay: max,
            multiplier,
        }
    }

    /// Allow at most `attempts` connect attempts in total.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some()
    }

    /// Delay to wait after `failures` consecutive failed attempts, or `None`
    /// when no further attempt is allowed.
    pub fn delay_for(&self, failures: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts
            && failures >= max
        {
            return None;
        }
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        // NaN and overflow both land on the cap.
        let secs = if secs.is_finite() { secs.clamp(0.0, cap) } else { cap };
        Some(Duration::from_secs_f64(secs))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_DELAY)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shutdown helper
// ─────────────────────────────────────────────────────────────────────────────

/// Resolve once `shutdown` carries `true`.
///
/// If every sender is gone the signal can never fire, so this pends forever.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// connect_with_retry
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a successful [`connect_with_retry`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Connected after `attempts` tries (1 = first try).
    Connected { attempts: u32 },
    /// Shutdown was requested before a connection was made.
    Shutdown,
}

/// What came of waiting out one retry delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The delay elapsed; try again.
    Elapsed,
    /// Shutdown was requested while waiting.
    Shutdown,
    /// No further attempt is allowed.
    Exhausted,
}

/// Wait out the delay owed after `failures` consecutive failures of `name`.
///
/// Returns [`Backoff::Exhausted`] without waiting once the budget is spent.
pub async fn backoff(
    name: &str,
    policy: &RetryPolicy,
    failures: u32,
    cause: &ScanError,
    shutdown: &mut watch::Receiver<bool>,
) -> Backoff {
    let Some(delay) = policy.delay_for(failures) else {
        warn!(source = %name, attempts = failures, error = %cause, "giving up on telemetry source");
        return Backoff::Exhausted;
    };
    warn!(
        source = %name,
        attempt = failures,
        error = %cause,
        "retrying in {:.1}s",
        delay.as_secs_f64()
    );

    tokio::select! {
        _ = tokio::time::sleep(delay) => Backoff::Elapsed,
        _ = shutdown_requested(shutdown) => Backoff::Shutdown,
    }
}

/// Connect `source`, retrying recoverable failures per `policy`.
///
/// # Errors
///
/// Returns the last connect error once the retry budget is spent, or the
/// first non-recoverable error immediately.
pub async fn connect_with_retry<S>(
    source: &mut S,
    policy: &RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<ConnectOutcome, ScanError>
where
    S: TelemetrySource + ?Sized,
{
    let mut failures = 0;
    connect_after_failures(source, policy, &mut failures, shutdown).await
}

/// Like [`connect_with_retry`], but continues a failure streak.
///
/// `failures` holds the consecutive failures already charged against
/// `policy` and is incremented for every failed connect.  The caller resets
/// it once the connection has proven itself.
pub async fn connect_after_failures<S>(
    source: &mut S,
    policy: &RetryPolicy,
    failures: &mut u32,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<ConnectOutcome, ScanError>
where
    S: TelemetrySource + ?Sized,
{
    let name = source.describe();
    let mut attempts = 0u32;
    loop {
        if *shutdown.borrow() {
            return Ok(ConnectOutcome::Shutdown);
        }

        let result = tokio::select! {
            r = source.connect() => r,
            _ = shutdown_requested(shutdown) => return Ok(ConnectOutcome::Shutdown),
        };
        attempts += 1;

        let err = match result {
            Ok(()) => {
                info!(source = %name, attempts, "telemetry source connected");
                return Ok(ConnectOutcome::Connected { attempts });
            }
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => e,
        };

        *failures = failures.saturating_add(1);
        match backoff(&name, policy, *failures, &err, shutdown).await {
            Backoff::Elapsed => {}
            Backoff::Shutdown => return Ok(ConnectOutcome::Shutdown),
            Backoff::Exhausted => return Err(err),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use echoscan_middleware::ScriptedSource;

    #[test]
    fn default_is_unbounded_five_second_fixed_delay() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_bounded());
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_for(1_000), Some(Duration::from_secs(5)));
    }

    #[test]
    fn exponential_delay_is_capped() {
        let policy =
            RetryPolicy::exponential(Duration::from_millis(100), Duration::from_millis(500), 2.0);
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(u32::MAX), Some(Duration::from_millis(500)));
    }

    #[test]
    fn bounded_policy_stops_at_budget() {
        let policy = RetryPolicy::fixed(Duration::from_millis(10)).with_max_attempts(2);
        assert!(policy.delay_for(1).is_some());
        assert_eq!(policy.delay_for(2), None);
    }

    #[test]
    fn deserializes_millisecond_fields() {
        let json = r#"{"max_attempts": 3, "initial_delay_ms": 250, "multiplier": 2.0}"#;
        let policy: RetryPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.max_attempts, Some(3));
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        // Unset fields fall back to the default policy.
        assert_eq!(policy.max_delay, DEFAULT_RETRY_DELAY);
    }

    #[tokio::test]
    async fn retries_until_connected() {
        let (_tx, mut rx) = watch::channel(false);
        let mut source = ScriptedSource::new([]).failing_connects(2);
        let policy = RetryPolicy::fixed(Duration::from_millis(1));

        let outcome = connect_with_retry(&mut source, &policy, &mut rx).await.unwrap();
        assert_eq!(outcome, ConnectOutcome::Connected { attempts: 3 });
        assert_eq!(source.connects(), 3);
    }

    #[tokio::test]
    async fn gives_up_when_budget_spent() {
        let (_tx, mut rx) = watch::channel(false);
        let mut source = ScriptedSource::new([]).failing_connects(10);
        let policy = RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(3);

        let err = connect_with_retry(&mut source, &policy, &mut rx).await.unwrap_err();
        assert!(matches!(err, ScanError::Transport { .. }));
        assert_eq!(source.connects(), 3);
    }

    #[tokio::test]
    async fn shutdown_cancels_retry_wait() {
        let (tx, mut rx) = watch::channel(false);
        let mut source = ScriptedSource::new([]).failing_connects(u32::MAX);
        // An hour-long wait would hang the test if shutdown were ignored.
        let policy = RetryPolicy::fixed(Duration::from_secs(3600));

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            connect_with_retry(&mut source, &policy, &mut rx),
        )
        .await
        .expect("retry loop ignored shutdown")
        .unwrap();
        assert_eq!(outcome, ConnectOutcome::Shutdown);
        assert_eq!(source.connects(), 1);
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn failure_streak_carries_into_next_connect() {
        let (_tx, mut rx) = watch::channel(false);
        let mut source = ScriptedSource::new([]).failing_connects(10);
        let policy = RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(3);

        // Two failures were already charged by earlier sessions.
        let mut failures = 2;
        let err = connect_after_failures(&mut source, &policy, &mut failures, &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Transport { .. }));
        assert_eq!(source.connects(), 1);
        assert_eq!(failures, 3);
    }

    #[tokio::test]
    async fn backoff_waits_then_reports_exhaustion() {
        let (_tx, mut rx) = watch::channel(false);
        let policy = RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(2);
        let cause = ScanError::transport("test://", "reset");

        assert_eq!(backoff("test://", &policy, 1, &cause, &mut rx).await, Backoff::Elapsed);
        assert_eq!(backoff("test://", &policy, 2, &cause, &mut rx).await, Backoff::Exhausted);
    }

    #[tokio::test]
    async fn shutdown_before_first_attempt_skips_connect() {
        let (_tx, mut rx) = watch::channel(true);
        let mut source = ScriptedSource::new([]);
        let outcome = connect_with_retry(&mut source, &RetryPolicy::default(), &mut rx)
            .await
            .unwrap();
        assert_eq!(outcome, ConnectOutcome::Shutdown);
        assert_eq!(source.connects(), 0);
    }
}
