//! Feeds the event log to registered projections.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::projection::Projection;
use crate::{ProjectionError, Result};

/// Replays the store's global log into projections.
///
/// Each projection only receives events past its own position, so catch-up
/// can run as often as needed. Catch-ups are serialized; two callers never
/// deliver the same event twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers every event a projection has not seen yet.
    ///
    /// Returns the number of deliveries made across all projections.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;

        let mut stream = self.store.stream_all_events().await?;
        let mut seen: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            seen += 1;

            for projection in &self.projections {
                if projection.position().await.has_consumed(seen) {
                    continue;
                }
                projection
                    .handle(&event)
                    .await
                    .map_err(|e| ProjectionError::Handler {
                        projection: projection.name(),
                        message: e.to_string(),
                    })?;
                delivered += 1;
            }
        }

        if delivered > 0 {
            metrics::counter!("projections_events_processed").increment(delivered);
            tracing::debug!(events = seen, delivered, "projections caught up");
        }
        Ok(delivered)
    }

    /// Resets every projection and replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        tracing::info!(projections = self.projections.len(), "rebuilding projections");
        self.run_catch_up().await
    }
}
