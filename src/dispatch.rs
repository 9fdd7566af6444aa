use std::any::Any;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;

/// Failures of the hand-off itself, as opposed to failures returned by the work
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Blocking task panicked: {0}")]
    Panicked(String),

    #[error("Blocking task was cancelled")]
    Cancelled,

    #[error("Blocking task did not finish within {0:?}")]
    TimedOut(Duration),
}

impl From<JoinError> for DispatchError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            DispatchError::Panicked(panic_message(err.into_panic()))
        } else {
            DispatchError::Cancelled
        }
    }
}

/// Runs blocking storage work on tokio's blocking pool so request tasks never
/// stall a runtime worker thread.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Run `work` on a blocking worker and deliver its single result.
    ///
    /// On timeout the caller stops waiting, but the work still runs to completion on
    /// its worker and drops whatever handles it acquired there.
    pub async fn run_blocking<T, F>(&self, work: F) -> Result<T, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(work);

        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => Ok(joined?),
                Err(_) => {
                    tracing::error!("Blocking storage task exceeded {:?}", limit);
                    Err(DispatchError::TimedOut(limit))
                }
            },
            None => Ok(handle.await?),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
