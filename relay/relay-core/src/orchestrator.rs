use crate::config::TerminationPolicy;
use crate::error::{PersistenceError, ProvisionError};
use crate::ledger::PersistentLedger;
use crate::network::TopicNetwork;
use crate::submitter::MessageSubmitter;
use crate::subscriber::{IngestProgress, TopicSubscriber};
use crate::types::TransferRecord;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The expected number of messages was accepted.
    Completed,
    /// No message arrived for the configured quiet window.
    Idle,
    /// The completion deadline passed first.
    DeadlineElapsed,
    SubscriptionFailed,
}

#[derive(Debug)]
pub struct RunReport {
    pub topic_identity: String,
    pub bridge_identity: String,
    pub submitted: Vec<u64>,
    pub failed_submissions: usize,
    pub ingest: IngestProgress,
    pub termination: TerminationReason,
    /// Set when the final save failed; the in-memory ledger of this run may be lost.
    pub persistence_error: Option<PersistenceError>,
}

pub struct BridgeOrchestrator {
    network: Arc<dyn TopicNetwork>,
    ledger: PersistentLedger,
    policy: TerminationPolicy,
}

impl BridgeOrchestrator {
    pub fn new(network: Arc<dyn TopicNetwork>, ledger: PersistentLedger, policy: TerminationPolicy) -> Self {
        Self {
            network,
            ledger,
            policy,
        }
    }

    pub fn ledger(&self) -> &PersistentLedger {
        &self.ledger
    }

    /// Provisions identities, relays `records` and ingests the topic until the
    /// termination policy fires, then saves the ledger.
    ///
    /// Only provisioning and subscription failures are returned as errors.
    pub async fn run(&self, records: &[TransferRecord]) -> Result<RunReport, ProvisionError> {
        let (topic, topic_created) = self.ensure_topic().await?;
        let (bridge, bridge_created) = self.ensure_bridge_identity().await?;

        if topic_created || bridge_created {
            if let Err(e) = self.ledger.save().await {
                warn!(error = %e, "failed to persist provisioned identities");
            }
        }
        info!(bridge = %bridge, topic = %topic, "bridge ready");

        let subscriber = TopicSubscriber::new(self.network.clone(), self.ledger.clone());
        let handle = subscriber
            .start(&topic)
            .await
            .map_err(|source| ProvisionError::Subscribe {
                topic: topic.clone(),
                source,
            })?;

        let submitter = MessageSubmitter::new(self.network.clone());
        let batch = submitter.submit_batch(&topic, records).await;
        if batch.failed() > 0 {
            warn!(
                submitted = batch.submitted(),
                failed = batch.failed(),
                "some transfers were not submitted"
            );
        }

        // Unset target: every record the topic acknowledged.
        let policy = match self.policy {
            TerminationPolicy::Completion { expected: None, deadline } => TerminationPolicy::Completion {
                expected: Some(batch.submitted() as u64),
                deadline,
            },
            policy => policy,
        };
        let termination = wait_for_termination(handle.watch(), policy).await;
        info!(reason = ?termination, "stopping bridge");

        let ingest = handle.stop().await;

        let persistence_error = match self.ledger.save().await {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, path = %self.ledger.path().display(), "failed to save ledger; state of this run may be lost");
                Some(e)
            }
        };

        Ok(RunReport {
            topic_identity: topic,
            bridge_identity: bridge,
            submitted: batch.sequences,
            failed_submissions: batch.failures.len(),
            ingest,
            termination,
            persistence_error,
        })
    }

    async fn ensure_topic(&self) -> Result<(String, bool), ProvisionError> {
        if let Some(topic) = self.ledger.topic_identity().await {
            info!(topic = %topic, "reusing topic");
            return Ok((topic, false));
        }

        let topic = self.network.create_topic().await.map_err(ProvisionError::Topic)?;
        self.ledger.set_topic_identity(&topic).await;
        Ok((topic, true))
    }

    async fn ensure_bridge_identity(&self) -> Result<(String, bool), ProvisionError> {
        if let Some(bridge) = self.ledger.bridge_identity().await {
            return Ok((bridge, false));
        }

        let bridge = self.network.create_account().await.map_err(ProvisionError::Account)?;
        self.ledger.set_bridge_identity(&bridge).await;
        info!(bridge = %bridge, "bridge account provisioned");
        Ok((bridge, true))
    }
}

async fn wait_for_termination(
    mut progress: watch::Receiver<IngestProgress>,
    policy: TerminationPolicy,
) -> TerminationReason {
    match policy {
        TerminationPolicy::Completion { expected, deadline } => {
            let expected = expected.unwrap_or(0);
            let finished = async {
                let completed = progress
                    .wait_for(|p| p.accepted >= expected || p.state.is_terminal())
                    .await
                    .map(|p| p.accepted >= expected)
                    .unwrap_or(false);
                if completed {
                    TerminationReason::Completed
                } else {
                    TerminationReason::SubscriptionFailed
                }
            };

            match deadline {
                Some(deadline) => timeout(deadline, finished)
                    .await
                    .unwrap_or(TerminationReason::DeadlineElapsed),
                None => finished.await,
            }
        }
        TerminationPolicy::Idle { quiet } => {
            if progress.borrow_and_update().state.is_terminal() {
                return TerminationReason::SubscriptionFailed;
            }

            loop {
                match timeout(quiet, progress.changed()).await {
                    Err(_) => return TerminationReason::Idle,
                    Ok(Err(_)) => return TerminationReason::SubscriptionFailed,
                    Ok(Ok(())) => {
                        if progress.borrow_and_update().state.is_terminal() {
                            return TerminationReason::SubscriptionFailed;
                        }
                    }
                }
            }
        }
    }
}
