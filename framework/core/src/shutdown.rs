use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch::{Receiver, Sender};

use crate::clock::Clock;

/// Requests that the current run stops at its next step boundary.
///
/// The signal latches: once [ShutdownHandle::shutdown] has been called every existing and future
/// listener observes it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(tokio::sync::watch::channel(false).0),
        }
    }

    pub fn shutdown(&self) {
        if self.sender.send_replace(true) {
            log::debug!("Shutdown was already requested");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if the shutdown signal has been received. If this returns true then
    /// no further step should be started.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Same as [DelegatedShutdownListener::should_shutdown] but in a form that can be used with `?`.
    pub fn check(&self) -> Result<(), ShutdownSignalError> {
        if self.should_shutdown() {
            Err(ShutdownSignalError::default())
        } else {
            Ok(())
        }
    }

    /// Wait for the shutdown signal to be received. It is safe to race this with another future so
    /// that the shutdown signal can be used to cancel other work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        if self.receiver.wait_for(|requested| *requested).await.is_err() {
            // The handle is gone so the signal can never arrive.
            std::future::pending::<()>().await;
        }
    }

    /// Sleep on the given clock unless the shutdown signal arrives first.
    ///
    /// Only sleeps are raced against the signal. Work that is already in flight is left to finish.
    pub async fn sleep(
        &mut self,
        clock: &dyn Clock,
        duration: Duration,
    ) -> Result<(), ShutdownSignalError> {
        self.check()?;

        tokio::select! {
            biased;
            _ = self.wait_for_shutdown() => Err(ShutdownSignalError::default()),
            _ = clock.sleep(duration) => Ok(()),
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}
