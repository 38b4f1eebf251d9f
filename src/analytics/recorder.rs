//! Fire-and-forget analytics recording
//!
//! `record` hands a visit to a bounded mpsc queue and returns immediately.
//! A single actor task classifies the visit, resolves its country, appends
//! the event and invalidates the cached aggregate. Failures at any step are
//! logged and counted, never returned to the redirect path.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::analytics::aggregator::AnalyticsAggregator;
use crate::analytics::classify::classify_user_agent;
use crate::analytics::geoip::{Country, CountryResolver};
use crate::analytics::models::Visit;
use crate::models::{AnalyticsEvent, NewAnalyticsEvent};
use crate::storage::{Storage, StorageResult};

/// Message types for the recorder actor
enum ActorMessage {
    Record { link_id: String, visit: Visit },
    /// Reply once every earlier message has been processed
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct Counters {
    recorded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of recorder outcomes since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub recorded: u64,
    /// Insert failed (storage unavailable, link vanished, timeout)
    pub failed: u64,
    /// Queue was full or closed
    pub dropped: u64,
}

/// Builds and stores analytics events
#[derive(Clone)]
pub struct EventWriter {
    storage: Arc<dyn Storage>,
    countries: Arc<dyn CountryResolver>,
    aggregator: Arc<AnalyticsAggregator>,
}

impl EventWriter {
    pub fn new(
        storage: Arc<dyn Storage>,
        countries: Arc<dyn CountryResolver>,
        aggregator: Arc<AnalyticsAggregator>,
    ) -> Self {
        Self {
            storage,
            countries,
            aggregator,
        }
    }

    /// Build the event row for a visit without touching storage.
    pub fn build_event(&self, link_id: &str, visit: &Visit) -> NewAnalyticsEvent {
        let agent = classify_user_agent(&visit.user_agent);
        let country = visit
            .client_ip
            .map(|ip: IpAddr| self.countries.resolve_country(ip))
            .unwrap_or(Country::Unknown);

        NewAnalyticsEvent {
            id: uuid::Uuid::new_v4().to_string(),
            link_id: link_id.to_string(),
            user_agent: visit.user_agent.clone(),
            referrer: visit.referrer.clone(),
            browser: agent.browser.as_str().to_string(),
            os: agent.os.as_str().to_string(),
            device_type: agent.device.as_str().to_string(),
            country: country.as_key().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Record one visit and wait for the insert.
    pub async fn write(&self, link_id: &str, visit: &Visit) -> StorageResult<AnalyticsEvent> {
        let event = self.build_event(link_id, visit);
        let stored = self.storage.insert_event(&event).await?;
        self.aggregator.invalidate(link_id).await;
        Ok(stored)
    }
}

struct RecorderActor {
    receiver: mpsc::Receiver<ActorMessage>,
    writer: EventWriter,
    counters: Arc<Counters>,
}

impl RecorderActor {
    async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ActorMessage::Record { link_id, visit } => self.record(&link_id, &visit).await,
                ActorMessage::Flush(done) => {
                    let _ = done.send(());
                }
                ActorMessage::Shutdown(done) => {
                    info!("Analytics recorder received shutdown signal, draining queue...");
                    self.receiver.close();
                    while let Some(msg) = self.receiver.recv().await {
                        match msg {
                            ActorMessage::Record { link_id, visit } => {
                                self.record(&link_id, &visit).await
                            }
                            ActorMessage::Flush(done) | ActorMessage::Shutdown(done) => {
                                let _ = done.send(());
                            }
                        }
                    }
                    let _ = done.send(());
                    return;
                }
            }
        }
        debug!("Analytics recorder channel closed");
    }

    async fn record(&self, link_id: &str, visit: &Visit) {
        match self.writer.write(link_id, visit).await {
            Ok(event) => {
                self.counters.recorded.fetch_add(1, Ordering::Relaxed);
                debug!(
                    link_id = %link_id,
                    browser = %event.browser,
                    device = %event.device_type,
                    country = %event.country,
                    "recorded analytics event"
                );
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(link_id = %link_id, error = %err, "failed to record analytics event");
            }
        }
    }
}

/// Handle to the recorder actor
#[derive(Clone)]
pub struct AnalyticsRecorder {
    actor_tx: mpsc::Sender<ActorMessage>,
    counters: Arc<Counters>,
}

impl AnalyticsRecorder {
    /// Spawn the recorder actor on the current tokio runtime.
    pub fn spawn(writer: EventWriter, queue_capacity: usize) -> Self {
        let (actor_tx, receiver) = mpsc::channel(queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let actor = RecorderActor {
            receiver,
            writer,
            counters: Arc::clone(&counters),
        };
        tokio::spawn(actor.run());

        Self { actor_tx, counters }
    }

    /// Queue a visit for recording. Never waits; drops the visit when the queue is full.
    pub fn record(&self, link_id: &str, visit: Visit) {
        let msg = ActorMessage::Record {
            link_id: link_id.to_string(),
            visit,
        };
        if let Err(err) = self.actor_tx.try_send(msg) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            match err {
                mpsc::error::TrySendError::Full(_) => {
                    warn!(link_id = %link_id, "Analytics queue full, dropping event")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!(link_id = %link_id, "Analytics recorder stopped, dropping event")
                }
            }
        }
    }

    /// Wait until every visit queued before this call has been processed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.actor_tx.send(ActorMessage::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Drain the queue and stop the actor.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.actor_tx.send(ActorMessage::Shutdown(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            recorded: self.counters.recorded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}
