//! Access token refresh scheduling
//! Mission: Keep at most one pending refresh per session holder

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long before expiry the refresh fires
pub const DEFAULT_REFRESH_LEAD: Duration = Duration::from_secs(60);

/// Floor on the wait between refreshes, so a very short lifetime cannot spin.
const MIN_DELAY: Duration = Duration::from_secs(1);

/// A single cancellable refresh task.
///
/// Scheduling replaces any pending task instead of stacking a second one.
/// Dropping the scheduler cancels whatever is pending.
pub struct RefreshScheduler {
    lead: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::with_lead(DEFAULT_REFRESH_LEAD)
    }

    pub fn with_lead(lead: Duration) -> Self {
        Self {
            lead,
            pending: Mutex::new(None),
        }
    }

    /// Wait before refreshing a token that expires in `expires_in`
    pub fn delay_for(&self, expires_in: Duration) -> Duration {
        refresh_delay(expires_in, self.lead)
    }

    /// Schedule `refresh` to run shortly before `expires_in` elapses.
    ///
    /// `refresh` returns the new token lifetime to keep the cycle going, or
    /// `None` to stop. Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, expires_in: Duration, mut refresh: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        let lead = self.lead;
        let first_delay = self.delay_for(expires_in);
        let handle = tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                tokio::time::sleep(delay).await;
                match refresh().await {
                    Some(next) => delay = refresh_delay(next, lead),
                    None => {
                        debug!("Token refresh cycle stopped");
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.pending.lock().replace(handle) {
            previous.abort();
            debug!("Replaced pending token refresh");
        }
    }

    /// Cancel the pending refresh. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                was_running
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

fn refresh_delay(expires_in: Duration, lead: Duration) -> Duration {
    expires_in.saturating_sub(lead).max(MIN_DELAY)
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}
