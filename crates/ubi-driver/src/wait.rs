//! Waiting for a new instance to report its address.
//!
//! Provisioning is asynchronous on the provider side: the create call
//! returns a service id long before the VM has an IP. The wait polls at a
//! fixed interval, treating query errors as transient, and gives up on
//! timeout, attempt cap, or cancellation. A query still in flight is
//! abandoned when the deadline passes or the token is cancelled.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::BoxError;
use crate::client::InstanceDetails;

/// How long and how often to poll for the instance address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between queries
    pub interval: Duration,
    /// Give up once this much time has passed (`None` = no limit)
    pub timeout: Option<Duration>,
    /// Give up after this many queries (`None` = no limit)
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Some(Duration::from_secs(600)),
            max_attempts: None,
        }
    }
}

/// Address observed by a successful wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    pub address: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    TimedOut { attempts: u32, elapsed: Duration },
    Cancelled { attempts: u32 },
}

/// Poll `query` until it reports a non-empty address.
pub async fn wait_for_address<F, Fut>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut query: F,
) -> Result<Ready, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<InstanceDetails, BoxError>>,
{
    let started = Instant::now();
    let deadline = policy.timeout.map(|t| started + t);
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled { attempts });
        }

        attempts += 1;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(WaitError::Cancelled { attempts }),
            _ = deadline_reached(deadline) => {
                return Err(WaitError::TimedOut { attempts, elapsed: started.elapsed() });
            }
            outcome = query() => outcome,
        };
        match outcome {
            Ok(details) => match details.address.filter(|a| !a.is_empty()) {
                Some(address) => return Ok(Ready { address, attempts }),
                None => debug!(attempt = attempts, status = %details.status, "waiting for instance address"),
            },
            Err(e) => debug!(attempt = attempts, error = %e, "waiting for VM creation"),
        }

        let elapsed = started.elapsed();
        let out_of_attempts = policy.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = policy.timeout.is_some_and(|t| elapsed >= t);
        if out_of_attempts || out_of_time {
            return Err(WaitError::TimedOut { attempts, elapsed });
        }

        let pause = match policy.timeout {
            Some(t) => policy.interval.min(t.saturating_sub(elapsed)),
            None => policy.interval,
        };
        tokio::select! {
            _ = cancel.cancelled() => return Err(WaitError::Cancelled { attempts }),
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

/// Resolves at `deadline`, or never when there is none.
async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
