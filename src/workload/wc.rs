//! A MapReduce-compatible implementation of word count.

use crate::{KeyValue, MapOutput};
use anyhow::Result;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Emit `(word, 1)` for every word in the input. Words are maximal
/// alphabetic runs, lowercased.
pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let s = String::from_utf8(kv.value.as_ref().into())?;
    let records: Vec<KeyValue> = s
        .split(|c: char| !c.is_alphabetic())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut count = BytesMut::with_capacity(8);
            count.put_u64(1);
            KeyValue::new(Bytes::from(word.to_lowercase()), count.freeze())
        })
        .collect();

    Ok(Box::new(records.into_iter().map(Ok)))
}

/// Sum the counts for one word and format the output line.
pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let count: u64 = values.map(|mut value| value.get_u64()).sum();
    let word = String::from_utf8(key.to_vec())?;
    Ok(Bytes::from(format!("{} {}\n", word, count)))
}
