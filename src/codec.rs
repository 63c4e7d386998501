//! Length-prefixed framing of key-value records.
//!
//! Intermediate files hold the serialized record sequence one map task
//! routed to one bucket: for each record, the key length, the key bytes,
//! the value length, the value bytes. Files are only ever observed whole
//! (they are published by atomic rename), so a decode error means a real
//! protocol bug, not a torn write.

use crate::KeyValue;
use anyhow::{ensure, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Append one record to `buf`.
pub fn encode_record(buf: &mut BytesMut, kv: &KeyValue) {
    buf.put_u64(kv.key.len() as u64);
    buf.put_slice(&kv.key);
    buf.put_u64(kv.value.len() as u64);
    buf.put_slice(&kv.value);
}

/// Serialize a whole record sequence.
pub fn encode_records<'a>(records: impl IntoIterator<Item = &'a KeyValue>) -> Bytes {
    let mut buf = BytesMut::new();
    for kv in records {
        encode_record(&mut buf, kv);
    }
    buf.freeze()
}

/// Decode every record in `buf`.
pub fn decode_records(mut buf: Bytes) -> Result<Vec<KeyValue>> {
    let mut records = Vec::new();
    while buf.has_remaining() {
        let key = take_frame(&mut buf)?;
        let value = take_frame(&mut buf)?;
        records.push(KeyValue { key, value });
    }
    Ok(records)
}

fn take_frame(buf: &mut Bytes) -> Result<Bytes> {
    ensure!(buf.remaining() >= 8, "truncated record length");
    let len = buf.get_u64() as usize;
    ensure!(buf.remaining() >= len, "truncated record body");
    Ok(buf.split_to(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(key: &str, value: &str) -> KeyValue {
        KeyValue::new(Bytes::copy_from_slice(key.as_bytes()), Bytes::copy_from_slice(value.as_bytes()))
    }

    #[test]
    fn records_survive_a_round_trip() {
        let records = vec![kv("apple", "1"), kv("", "empty key"), kv("pear", "")];
        let decoded = decode_records(encode_records(&records)).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn empty_input_decodes_to_no_records() {
        assert!(decode_records(Bytes::new()).unwrap().is_empty());
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut encoded = encode_records(&[kv("apple", "1")]);
        let truncated = encoded.split_to(encoded.len() - 1);
        assert!(decode_records(truncated).is_err());
    }
}
