//! Byte encoding of [`TransferRecord`]s on the topic.
//!
//! Records travel as compact JSON objects with the keys `from`, `amount` and
//! `sigHash`. Decoding also accepts `signatureHash` in place of `sigHash`.

use crate::error::CodecError;
use crate::types::TransferRecord;

pub fn encode_transfer(record: &TransferRecord) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(record)?)
}

pub fn decode_transfer(bytes: &[u8]) -> Result<TransferRecord, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}
