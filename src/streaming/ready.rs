//! Waiting for a freshly launched encoder to publish its playlist.

use std::time::Duration;

use stillcast_common::{Error, Result, StreamKey};

use super::registry::JobState;
use super::store::ArtifactStore;

/// Poll cadence and ceiling for readiness waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Wait until `key` is ready in `store`.
///
/// `probe` reports the encoder's registry state on every tick. An encoder
/// that exits without a playlist fails the wait immediately instead of
/// running out the clock, and so does a job evicted from the registry.
pub async fn await_ready<F>(
    store: &ArtifactStore,
    key: &StreamKey,
    policy: &ReadyPolicy,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> JobState,
{
    let poll = async {
        loop {
            if store.is_ready(key).await {
                return Ok(());
            }
            match probe() {
                JobState::Running => {}
                JobState::Exited(status) => {
                    // The playlist may have landed just before the exit.
                    if store.is_ready(key).await {
                        return Ok(());
                    }
                    return Err(Error::EncoderExited {
                        key: key.to_string(),
                        status,
                    });
                }
                // The directory is gone or about to be.
                JobState::Gone => {
                    return Err(Error::Evicted {
                        key: key.to_string(),
                    })
                }
            }
            tokio::time::sleep(policy.poll_interval).await;
        }
    };

    match tokio::time::timeout(policy.timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(Error::ReadinessTimeout {
            key: key.to_string(),
            waited: policy.timeout,
        }),
    }
}
