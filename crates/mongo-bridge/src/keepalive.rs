//! Periodic keepalive pings
//!
//! A host may keep a long-idle connection warm by pinging it on a timer. The
//! task is handed to the [`DbManager`](crate::DbManager), which cancels it
//! before closing anything at shutdown.

use bson::doc;
use mongo_bridge_common::Result;
use mongodb::Database;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Handle to a running keepalive task
#[derive(Debug)]
pub struct Keepalive {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
    every: Duration,
}

impl Keepalive {
    /// Run `tick` every `every`, starting one period from now.
    ///
    /// Tick failures are logged and the timer keeps running.
    pub fn spawn<F, Fut>(every: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        trace!("Keepalive task stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = tick().await {
                            warn!(error = %e, "Keepalive ping failed");
                        }
                    }
                }
            }
        });

        Self {
            shutdown,
            handle,
            every,
        }
    }

    /// Ping `database` every `every`
    pub fn ping(database: Database, every: Duration) -> Self {
        Self::spawn(every, move || {
            let database = database.clone();
            async move {
                database.run_command(doc! { "ping": 1 }).await?;
                Ok(())
            }
        })
    }

    pub fn period(&self) -> Duration {
        self.every
    }

    /// Stop the timer; safe to call more than once
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Whether the background task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongo_bridge_common::BridgeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn wait_finished(keepalive: &Keepalive) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !keepalive.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("keepalive task should stop after cancel");
    }

    #[tokio::test]
    async fn test_keepalive_ticks_until_cancelled() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let keepalive = Keepalive::spawn(Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 2);

        keepalive.cancel();
        assert!(keepalive.is_cancelled());
        wait_finished(&keepalive).await;

        let after_cancel = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test]
    async fn test_keepalive_survives_failed_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let keepalive = Keepalive::spawn(Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(BridgeError::Connection("server went away".to_string()))
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 2);
        assert!(!keepalive.is_finished());
        keepalive.cancel();
        wait_finished(&keepalive).await;
    }

    #[tokio::test]
    async fn test_first_tick_waits_one_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let keepalive = Keepalive::spawn(Duration::from_secs(3600), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(keepalive.period(), Duration::from_secs(3600));
        keepalive.cancel();
    }
}
