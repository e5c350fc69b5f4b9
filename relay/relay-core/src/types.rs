use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transfer as carried on the topic.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub from: String,
    pub amount: String,
    #[serde(rename = "sigHash", alias = "signatureHash")]
    pub signature_hash: String,
}

impl TransferRecord {
    pub fn new(from: impl Into<String>, amount: impl Into<String>, signature_hash: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            amount: amount.into(),
            signature_hash: signature_hash.into(),
        }
    }
}

/// A consumed topic message as recorded in the ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    #[serde(alias = "transactionId")]
    pub sequence: u64,
    pub from: String,
    pub amount: String,
    #[serde(rename = "sigHash", alias = "signatureHash")]
    pub signature_hash: String,
}

impl LedgerEntry {
    pub fn from_record(sequence: u64, record: TransferRecord) -> Self {
        Self {
            sequence,
            from: record.from,
            amount: record.amount,
            signature_hash: record.signature_hash,
        }
    }
}

/// How [`BridgeState::apply_entry`] decides whether an entry may advance the watermark.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// Accept anything above the watermark; gaps are never backfilled.
    #[default]
    Watermark,
    /// Accept only `watermark + 1`.
    Contiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Accepted,
    RejectedDuplicate,
    RejectedOutOfOrder,
}

impl ApplyOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ApplyOutcome::Accepted)
    }
}

/// Everything the bridge persists between runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeState {
    #[serde(rename = "bridgeId", default)]
    pub bridge_identity: String,
    #[serde(rename = "topicId", default)]
    pub topic_identity: String,
    #[serde(rename = "transactions", default)]
    pub entries: Vec<LedgerEntry>,
    #[serde(rename = "lastProcessedTopic", default)]
    pub last_consumed_sequence: u64,
}

impl BridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` if it lies above the watermark and advances the watermark to it.
    ///
    /// Rejected entries leave the state untouched. Under [`OrderingMode::Contiguous`] an
    /// entry that would open a gap is rejected as out of order.
    pub fn apply_entry(&mut self, entry: LedgerEntry, ordering: OrderingMode) -> ApplyOutcome {
        if entry.sequence <= self.last_consumed_sequence {
            return ApplyOutcome::RejectedDuplicate;
        }

        if ordering == OrderingMode::Contiguous && entry.sequence != self.last_consumed_sequence + 1 {
            return ApplyOutcome::RejectedOutOfOrder;
        }

        self.last_consumed_sequence = entry.sequence;
        self.entries.push(entry);
        ApplyOutcome::Accepted
    }

    /// Returns false when a topic identity is already recorded.
    pub fn assign_topic_identity(&mut self, id: &str) -> bool {
        if !self.topic_identity.is_empty() {
            return false;
        }
        self.topic_identity = id.to_string();
        true
    }

    /// Returns false when a bridge identity is already recorded.
    pub fn assign_bridge_identity(&mut self, id: &str) -> bool {
        if !self.bridge_identity.is_empty() {
            return false;
        }
        self.bridge_identity = id.to_string();
        true
    }

    pub fn topic(&self) -> Option<&str> {
        (!self.topic_identity.is_empty()).then_some(self.topic_identity.as_str())
    }

    pub fn bridge(&self) -> Option<&str> {
        (!self.bridge_identity.is_empty()).then_some(self.bridge_identity.as_str())
    }

    /// Checks what `apply_entry` maintains: entry sequences strictly increase and
    /// none lies above the watermark.
    pub fn check_consistency(&self) -> Result<(), String> {
        for pair in self.entries.windows(2) {
            if pair[1].sequence <= pair[0].sequence {
                return Err(format!(
                    "entry {} follows entry {}",
                    pair[1].sequence, pair[0].sequence
                ));
            }
        }
        if let Some(last) = self.entries.last() {
            if last.sequence > self.last_consumed_sequence {
                return Err(format!(
                    "entry {} lies above watermark {}",
                    last.sequence, self.last_consumed_sequence
                ));
            }
        }
        Ok(())
    }
}

/// A message as delivered by the topic network.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    pub sequence: u64,
    pub contents: Vec<u8>,
    pub consensus_timestamp: DateTime<Utc>,
}

impl TopicMessage {
    pub fn new(sequence: u64, contents: Vec<u8>) -> Self {
        Self {
            sequence,
            contents,
            consensus_timestamp: Utc::now(),
        }
    }
}
