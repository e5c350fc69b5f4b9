use crate::codec::encode_transfer;
use crate::error::SubmitError;
use crate::network::TopicNetwork;
use crate::types::TransferRecord;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of submitting a batch: what the topic acknowledged and what failed.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Sequences assigned to the records that were acknowledged, in submission order.
    pub sequences: Vec<u64>,
    /// Index into the batch and the error of every failed record.
    pub failures: Vec<(usize, SubmitError)>,
}

impl BatchOutcome {
    pub fn submitted(&self) -> usize {
        self.sequences.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct MessageSubmitter {
    network: Arc<dyn TopicNetwork>,
}

impl MessageSubmitter {
    pub fn new(network: Arc<dyn TopicNetwork>) -> Self {
        Self { network }
    }

    pub async fn submit(&self, topic: &str, record: &TransferRecord) -> Result<u64, SubmitError> {
        let payload = encode_transfer(record)?;
        let sequence = self.network.publish(topic, payload).await?;
        Ok(sequence)
    }

    /// Submits `records` one after another. A failed record is logged and skipped, never retried.
    pub async fn submit_batch(&self, topic: &str, records: &[TransferRecord]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (index, record) in records.iter().enumerate() {
            match self.submit(topic, record).await {
                Ok(sequence) => {
                    info!(topic, index, sequence, from = %record.from, "transfer submitted");
                    outcome.sequences.push(sequence);
                }
                Err(e) => {
                    warn!(topic, index, from = %record.from, error = %e, "transfer submission failed");
                    outcome.failures.push((index, e));
                }
            }
        }

        outcome
    }
}
