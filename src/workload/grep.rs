//! A MapReduce-compatible implementation of `grep`.
//!
//! The search term arrives through the auxiliary arguments, parsed with
//! the same clap derive used by the binaries.

use crate::{KeyValue, MapOutput};
use anyhow::Result;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(no_binary_name = true)]
struct Args {
    /// Substring to search for.
    #[clap(short, long, value_parser)]
    term: String,
}

/// Emit `(file, (line number, line))` for every matching line.
pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args = Args::try_parse_from(serde_json::from_slice::<Vec<String>>(&aux)?)?;
    let term = args.term;

    let contents = String::from_utf8(kv.value.as_ref().into())?;
    let records: Vec<KeyValue> = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(&term))
        .map(|(i, line)| {
            let mut value = BytesMut::with_capacity(8 + line.len());
            // Line numbers are 1-based.
            value.put_u64(i as u64 + 1);
            value.put_slice(line.as_bytes());
            KeyValue::new(kv.key(), value.freeze())
        })
        .collect();

    Ok(Box::new(records.into_iter().map(Ok)))
}

/// Print every match for one file in line order.
pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let file = String::from_utf8(key.to_vec())?;
    let mut matches = values.collect::<Vec<Bytes>>();
    matches.sort_by_key(|value| value.clone().get_u64());

    let mut out = BytesMut::new();
    for mut value in matches {
        let line_no = value.get_u64();
        let line = String::from_utf8(value.to_vec())?;
        out.put(format!("{}:{}:: {}\n", file, line_no, line).as_bytes());
    }
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_matching_lines_with_their_numbers() {
        let aux = Bytes::from(
            serde_json::to_string(&vec!["--term".to_string(), "pear".to_string()]).unwrap(),
        );
        let input = KeyValue::new(
            Bytes::from("fruit.txt"),
            Bytes::from("apple\npear tree\nplum\nprickly pear\n"),
        );
        let records: Vec<KeyValue> = map(input, aux.clone())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);

        let out = reduce(
            Bytes::from("fruit.txt"),
            Box::new(records.into_iter().map(KeyValue::into_value)),
            aux,
        )
        .unwrap();
        assert_eq!(
            out.as_ref(),
            b"fruit.txt:2:: pear tree\nfruit.txt:4:: prickly pear\n".as_slice()
        );
    }
}
