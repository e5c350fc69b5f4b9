//! Background ingestion of topic messages into the ledger.
//!
//! A subscription runs as one tokio task that handles a single message at a
//! time, in delivery order. Progress is published on a `watch` channel so
//! callers can wait on it without polling.

use crate::codec::decode_transfer;
use crate::error::NetworkError;
use crate::ledger::PersistentLedger;
use crate::network::{TopicNetwork, TopicStream};
use crate::types::{ApplyOutcome, LedgerEntry, TopicMessage};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    Created,
    Listening,
    Stopped,
    Failed,
}

impl SubscriptionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionState::Stopped | SubscriptionState::Failed)
    }
}

/// Counters of one subscription. `delivered` counts every message, malformed ones included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestProgress {
    pub state: SubscriptionState,
    pub delivered: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub out_of_order: u64,
    pub malformed: u64,
    pub last_sequence: Option<u64>,
    pub last_delivery: Option<Instant>,
}

pub struct TopicSubscriber {
    network: Arc<dyn TopicNetwork>,
    ledger: PersistentLedger,
}

impl TopicSubscriber {
    pub fn new(network: Arc<dyn TopicNetwork>, ledger: PersistentLedger) -> Self {
        Self { network, ledger }
    }

    /// Subscribes to `topic` and spawns the listening task.
    ///
    /// Fails only when the subscription itself cannot be opened.
    pub async fn start(&self, topic: &str) -> Result<SubscriptionHandle, NetworkError> {
        let stream = self.network.subscribe(topic).await?;

        let (progress_tx, progress_rx) = watch::channel(IngestProgress::default());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        progress_tx.send_modify(|p| p.state = SubscriptionState::Listening);

        let task = tokio::spawn(listen(
            topic.to_string(),
            stream,
            self.ledger.clone(),
            progress_tx,
            cancel_rx,
        ));

        info!(topic, "subscription listening");
        Ok(SubscriptionHandle {
            topic: topic.to_string(),
            cancel: cancel_tx,
            progress: progress_rx,
            task,
        })
    }
}

pub struct SubscriptionHandle {
    topic: String,
    cancel: watch::Sender<bool>,
    progress: watch::Receiver<IngestProgress>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> SubscriptionState {
        self.progress.borrow().state
    }

    pub fn progress(&self) -> IngestProgress {
        self.progress.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<IngestProgress> {
        self.progress.clone()
    }

    /// Cancels the listening task and waits for it to finish.
    ///
    /// A message already being ingested completes; nothing is dispatched afterwards,
    /// so the ledger sees no further `apply_entry` once this returns.
    pub async fn stop(self) -> IngestProgress {
        let _ = self.cancel.send(true);
        if let Err(e) = self.task.await {
            error!(topic = %self.topic, error = %e, "subscription task did not shut down cleanly");
        }

        let progress = self.progress.borrow().clone();
        info!(
            topic = %self.topic,
            state = ?progress.state,
            delivered = progress.delivered,
            accepted = progress.accepted,
            "subscription stopped"
        );
        progress
    }
}

async fn listen(
    topic: String,
    mut stream: TopicStream,
    ledger: PersistentLedger,
    progress: watch::Sender<IngestProgress>,
    mut cancel: watch::Receiver<bool>,
) {
    let end_state = loop {
        tokio::select! {
            biased;

            _ = cancel.changed() => break SubscriptionState::Stopped,

            item = stream.recv() => match item {
                Some(Ok(message)) => ingest(&topic, &ledger, &progress, message).await,
                Some(Err(e)) => {
                    error!(topic = %topic, error = %e, "subscription transport failed");
                    break SubscriptionState::Failed;
                }
                None => {
                    error!(topic = %topic, error = %NetworkError::StreamClosed, "subscription transport failed");
                    break SubscriptionState::Failed;
                }
            },
        }
    };

    progress.send_modify(|p| p.state = end_state);
}

async fn ingest(
    topic: &str,
    ledger: &PersistentLedger,
    progress: &watch::Sender<IngestProgress>,
    message: TopicMessage,
) {
    let sequence = message.sequence;
    debug!(
        topic,
        sequence,
        consensus_timestamp = %message.consensus_timestamp,
        "message received"
    );

    let outcome = match decode_transfer(&message.contents) {
        Ok(record) => Some(ledger.apply_entry(LedgerEntry::from_record(sequence, record)).await),
        Err(e) => {
            warn!(topic, sequence, error = %e, "dropping malformed message");
            None
        }
    };

    progress.send_modify(|p| {
        p.delivered += 1;
        p.last_sequence = Some(sequence);
        p.last_delivery = Some(Instant::now());
        match outcome {
            Some(ApplyOutcome::Accepted) => p.accepted += 1,
            Some(ApplyOutcome::RejectedDuplicate) => p.duplicates += 1,
            Some(ApplyOutcome::RejectedOutOfOrder) => p.out_of_order += 1,
            None => p.malformed += 1,
        }
    });
}
