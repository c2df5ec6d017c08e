use futures::Stream;
use tokio::runtime::Builder;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::EchoSession;
use crate::engine::types::SessionEvent;

impl EchoSession {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    /// Forward session events into an unbounded channel.
    ///
    /// The forwarder runs on its own thread with a current-thread runtime so
    /// callers do not need a Tokio runtime of their own. It ends when the
    /// session is dropped or the receiver is closed.
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.events_tx.subscribe();

        std::thread::spawn(move || {
            let rt = match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(err) => {
                    log::error!("[EchoSession] Failed to create event runtime: {}", err);
                    return;
                }
            };
            rt.block_on(async move {
                loop {
                    match broadcast_rx.recv().await {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            log::warn!("[EchoSession] Event subscriber lagged by {}", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        });

        rx
    }

    /// Direct broadcast receiver, for callers already inside a runtime.
    pub fn event_receiver(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    pub async fn event_stream(&self) -> impl Stream<Item = SessionEvent> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_events())
    }

    /// Milliseconds elapsed since the session was created. Event timestamps
    /// are taken from this clock.
    pub fn uptime_ms(&self) -> u64 {
        self.time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64
    }
}
