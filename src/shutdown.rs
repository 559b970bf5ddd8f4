//! Graceful shutdown coordination for long-running loops (the overdue
//! detector, the outbox dispatcher).

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

pub struct ShutdownCoordinator {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// A handle a loop can select on.
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            receiver: self.sender.subscribe(),
        }
    }

    /// Signal every handle to stop.
    pub fn trigger(&self) {
        info!("shutdown triggered");
        let _ = self.sender.send(true);
    }

    /// Block until SIGINT, then trigger shutdown.
    pub async fn listen_for_ctrl_c(&self) -> Result<()> {
        tokio::signal::ctrl_c().await?;
        info!("received ctrl-c, shutting down gracefully");
        self.trigger();
        Ok(())
    }
}

#[derive(Clone)]
pub struct ShutdownHandle {
    receiver: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Resolves once shutdown has been triggered.
    pub async fn wait(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        let _ = self.receiver.changed().await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}
