//! The dispatch loop.
//!
//! A single consumer that selects between the next delivered event and the
//! shutdown signal. Each event is handled end to end before the loop selects
//! again, so events are applied strictly in delivery order and at most one
//! database connection is in use at a time.

use tokio::sync::{broadcast, mpsc};

use crate::dispatch::{Dispatcher, Outcome};
use crate::event::Event;
use crate::membership::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events whose handler completed.
    pub processed: u64,
    /// Events dropped because of a dispatch error.
    pub dropped: u64,
}

pub struct DispatchLoop {
    dispatcher: Dispatcher,
    events: mpsc::UnboundedReceiver<Event>,
    shutdown: broadcast::Receiver<()>,
    state: LoopState,
    stats: DispatchStats,
}

impl DispatchLoop {
    pub fn new(dispatcher: Dispatcher, subscription: Subscription) -> Self {
        Self {
            dispatcher,
            events: subscription.events,
            shutdown: subscription.shutdown,
            state: LoopState::Running,
            stats: DispatchStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Run until the shutdown signal fires or the event stream closes.
    ///
    /// Events still queued when shutdown is observed are not processed. A
    /// loop that already stopped returns immediately.
    pub async fn run(&mut self) -> DispatchStats {
        if self.state == LoopState::Stopped {
            return self.stats;
        }
        tracing::info!("dispatch loop started");

        loop {
            tokio::select! {
                biased;

                res = self.shutdown.recv() => {
                    match res {
                        Ok(()) => tracing::info!("shutdown signal received"),
                        Err(e) => tracing::debug!("shutdown channel ended: {e}"),
                    }
                    break;
                }

                next = self.events.recv() => {
                    match next {
                        Some(event) => self.handle(event),
                        None => {
                            tracing::info!("event stream closed");
                            break;
                        }
                    }
                }
            }
        }

        self.state = LoopState::ShuttingDown;
        tracing::debug!(
            processed = self.stats.processed,
            dropped = self.stats.dropped,
            "dispatch loop shutting down"
        );
        self.state = LoopState::Stopped;
        tracing::info!("dispatch loop stopped");
        self.stats
    }

    fn handle(&mut self, event: Event) {
        let kind = event.kind;
        let name = event.name.clone();
        match self.dispatcher.dispatch(event) {
            Ok(Outcome::Responded { rows }) => {
                tracing::debug!(%kind, event = %name, rows, "query answered");
                self.stats.processed += 1;
            }
            Ok(Outcome::Applied(_)) => {
                self.stats.processed += 1;
            }
            Err(err) => {
                tracing::error!(%kind, event = %name, error_kind = err.kind(), "dropping event: {err}");
                self.stats.dropped += 1;
            }
        }
    }
}
