use std::time::Duration;

use anyhow::Result;
use umbra_store::SnapshotStore;
use umbra_transport::EventSource;

use crate::Reconciler;

/// Owns the service lifecycle: restore state, drain the event source one
/// event at a time, snapshot on the way out.
///
/// A handler failure drops that single event and the loop moves on; a source
/// failure backs off for `reconnect_delay` and polls again. Only shutdown
/// itself can end the loop.
pub struct MirrorService<S> {
    source: S,
    reconciler: Reconciler,
    snapshots: SnapshotStore,
    reconnect_delay: Duration,
}

impl<S: EventSource> MirrorService<S> {
    pub fn new(
        source: S,
        reconciler: Reconciler,
        snapshots: SnapshotStore,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            source,
            reconciler,
            snapshots,
            reconnect_delay,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        if let Some((entities, messages)) = self.snapshots.restore() {
            self.reconciler.load_state(entities, messages);
        }
        tracing::info!("mirror service started; waiting for events");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                    break;
                }
                next = self.source.next_event() => match next {
                    Ok(Some(event)) => {
                        let kind = event.kind();
                        if let Err(error) = self.reconciler.handle_event(event).await {
                            tracing::warn!(kind, %error, "event handler failed; event dropped");
                        }
                    }
                    Ok(None) => {
                        tracing::info!("event source closed");
                        break;
                    }
                    Err(error) => {
                        tracing::warn!(
                            %error,
                            delay_ms = self.reconnect_delay.as_millis() as u64,
                            "event source failed; backing off"
                        );
                        tokio::select! {
                            _ = tokio::signal::ctrl_c() => {
                                tracing::info!("shutdown signal received during backoff");
                                break;
                            }
                            _ = tokio::time::sleep(self.reconnect_delay) => {}
                        }
                    }
                },
            }
        }

        if let Err(error) = self.source.disconnect().await {
            tracing::warn!(%error, "event source shutdown failed");
        }
        let (entities, messages) = self.reconciler.dump_state();
        self.snapshots.save(entities, messages)?;
        tracing::info!("mirror service stopped; state snapshotted");
        Ok(())
    }
}
