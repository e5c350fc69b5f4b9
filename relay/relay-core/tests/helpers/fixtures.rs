use relay_core::codec::encode_transfer;
use relay_core::config::SavePolicy;
use relay_core::{LedgerEntry, OrderingMode, PersistentLedger, TopicMessage, TransferRecord};
use std::path::Path;

pub fn create_test_transfer(i: u64) -> TransferRecord {
    TransferRecord::new(format!("0x123{}", i), "100", format!("0x123100{}", i))
}

pub fn create_test_batch(count: u64) -> Vec<TransferRecord> {
    (0..count).map(create_test_transfer).collect()
}

pub fn create_test_entry(sequence: u64) -> LedgerEntry {
    LedgerEntry::from_record(sequence, create_test_transfer(sequence))
}

pub fn encoded_message(sequence: u64) -> TopicMessage {
    TopicMessage::new(sequence, encode_transfer(&create_test_transfer(sequence)).unwrap())
}

pub fn open_test_ledger(dir: &Path) -> PersistentLedger {
    PersistentLedger::open(dir.join("db.json"), OrderingMode::Watermark, SavePolicy::OnExit)
}
