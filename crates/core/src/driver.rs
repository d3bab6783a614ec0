//! Sync Driver
//!
//! [`CartSyncDriver`] is the event loop that owns the timers of a
//! [`CartStore`]: it fires debounced edits when their windows close, refreshes
//! the cart on a fixed interval and forwards session events.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    session::{Customer, CustomerAccessToken, SessionEvent},
    signal::SyncWait,
    store::CartStore,
};

const EVENT_CAPACITY: usize = 64;

/// The driver has stopped and no longer accepts events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cart sync driver has stopped")]
pub struct DriverStopped;

/// Sends session events to a running [`CartSyncDriver`].
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: mpsc::Sender<SessionEvent>,
    store: Arc<CartStore>,
}

impl SessionEvents {
    /// Queue an event.
    ///
    /// # Errors
    ///
    /// Returns `DriverStopped` if the driver has exited.
    pub async fn send(&self, event: SessionEvent) -> Result<(), DriverStopped> {
        self.sender.send(event).await.map_err(|_closed| DriverStopped)
    }

    /// Report a completed login and wait, at most the sync timeout, for the
    /// resulting synchronization.
    ///
    /// A timed-out wait is final: the synchronization keeps running in the
    /// background but will not resolve this call again.
    ///
    /// # Errors
    ///
    /// Returns `DriverStopped` if the driver has exited.
    pub async fn login(
        &self,
        token: CustomerAccessToken,
        customer: Customer,
    ) -> Result<SyncWait, DriverStopped> {
        let ticket = self.store.sync_signal().ticket();

        self.send(SessionEvent::LoginCompleted { token, customer })
            .await?;

        Ok(ticket.wait(self.store.settings().sync_timeout).await)
    }
}

/// Runs a [`CartStore`]'s timers and session events until every sender is dropped.
#[derive(Debug)]
pub struct CartSyncDriver {
    store: Arc<CartStore>,
    events: mpsc::Receiver<SessionEvent>,
}

impl CartSyncDriver {
    /// A driver for `store`, with a handle for sending it session events.
    pub fn new(store: Arc<CartStore>) -> (Self, SessionEvents) {
        let (sender, events) = mpsc::channel(EVENT_CAPACITY);

        let handle = SessionEvents {
            sender,
            store: Arc::clone(&store),
        };

        (
            Self { store, events },
            handle,
        )
    }

    /// Run until every [`SessionEvents`] handle is dropped.
    ///
    /// Pending debounced edits are flushed before returning.
    #[tracing::instrument(name = "cart.driver.run", skip_all)]
    pub async fn run(mut self) {
        let period = self.store.settings().poll_interval;
        let mut poll = tokio::time::interval_at(Instant::now() + period, period);

        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(?period, "cart sync driver started");

        loop {
            let due = self.until_next_deadline();

            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        break;
                    };

                    debug!(?event, "session event");

                    self.store.handle_event(event).await;
                }
                () = sleep_for(due) => {
                    let sent = self.store.flush_due().await;

                    debug!(sent, "debounce windows closed");
                }
                _ = poll.tick() => {
                    let outcome = self.store.refresh().await;

                    debug!(?outcome, "periodic refresh");
                }
                () = self.store.rescheduled() => {}
            }
        }

        let sent = self.store.flush_all().await;

        info!(sent, "cart sync driver stopped");
    }

    fn until_next_deadline(&self) -> Option<Duration> {
        let deadline = self.store.next_deadline()?;
        let remaining = deadline.duration_since(self.store.now());

        Some(Duration::try_from(remaining).unwrap_or(Duration::ZERO))
    }
}

async fn sleep_for(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
