//! Property tests for the merge, chunking and join stages

use std::collections::BTreeSet;
use std::io::Cursor;

use proptest::prelude::*;

use pid_shard_swap::line_io::{LineReader, LineWriter};
use pid_shard_swap::sort_merge::chunk::payload;
use pid_shard_swap::sort_merge::{is_sentinel, split_chunk};
use pid_shard_swap::{
    KWayShardsMerger, LineSource, MalformedRowPolicy, ShardReader, SortedIdSwapper,
};

fn shard_text(keys: &[u16], tag: &str) -> String {
    let mut text = String::from("id_,user_id\n");
    for (i, key) in keys.iter().enumerate() {
        text.push_str(&format!("{key:05},{tag}{i}\n"));
    }
    text
}

fn merger_over(shards: &[Vec<u16>]) -> KWayShardsMerger {
    let readers = shards
        .iter()
        .enumerate()
        .map(|(i, keys)| {
            let mut sorted = keys.clone();
            sorted.sort_unstable();
            let text = shard_text(&sorted, &format!("s{i}_"));
            LineReader::from_reader(format!("shard_{i}"), Cursor::new(text))
        })
        .collect();
    KWayShardsMerger::new(readers, MalformedRowPolicy::Fail).unwrap()
}

/// Output sink the test can read back after the swapper is closed
#[derive(Clone, Default)]
struct SharedBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn merged_stream_is_sorted_and_complete(
        shards in prop::collection::vec(prop::collection::vec(0u16..500, 0..40), 1..6)
    ) {
        let mut merger = merger_over(&shards);
        let mut keys = Vec::new();
        while let Some(line) = merger.get_next_line().unwrap() {
            prop_assert!(line.ends_with('\n'));
            keys.push(line[..5].to_string());
        }
        prop_assert!(merger.is_finished());
        prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        let total: usize = shards.iter().map(Vec::len).sum();
        prop_assert_eq!(keys.len(), total);
    }

    #[test]
    fn chunks_are_exact_and_never_split_records(
        mut keys in prop::collection::vec(0u16..10_000, 0..120),
        chunk_size in 16usize..200,
    ) {
        keys.sort_unstable();
        let text = shard_text(&keys, "user");
        let reader = LineReader::from_reader("shard", Cursor::new(text.clone()));
        let mut source = ShardReader::new(reader, MalformedRowPolicy::Fail).unwrap();

        let mut rebuilt = String::new();
        while !source.is_finished() {
            let chunk = source.next_chunk(chunk_size).unwrap();
            prop_assert_eq!(chunk.len(), chunk_size);
            prop_assert!(!is_sentinel(&chunk));
            let body = payload(&chunk);
            prop_assert!(body.len() < chunk_size);
            prop_assert_eq!(body.last(), Some(&b'\n'));
            rebuilt.push_str(std::str::from_utf8(body).unwrap());
        }
        let expected = text.split_once('\n').map(|(_, rows)| rows).unwrap_or("");
        prop_assert_eq!(rebuilt, expected);
    }

    #[test]
    fn swapper_output_equals_join(
        publisher in prop::collection::vec(prop::collection::vec(0u16..60, 0..30), 2..5),
        partner in prop::collection::vec(0u16..60, 0..80),
        split_points in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        // keys repeat within and across shards
        let mut merger = merger_over(&publisher);
        let sorted_shards: Vec<Vec<u16>> = publisher
            .iter()
            .map(|keys| {
                let mut sorted = keys.clone();
                sorted.sort_unstable();
                sorted
            })
            .collect();

        let mut partner_keys = partner.clone();
        partner_keys.sort_unstable();
        let lines: Vec<String> = partner_keys
            .iter()
            .enumerate()
            .map(|(i, key)| format!("{key:05},q{i}"))
            .collect();

        let sink = SharedBuf::default();
        let writer = LineWriter::from_writer("matches", sink.clone());
        let mut swapper = SortedIdSwapper::new(writer, MalformedRowPolicy::Fail).unwrap();

        // cut the partner rows into arbitrary batches
        let mut cuts: BTreeSet<usize> =
            split_points.iter().map(|ix| ix.index(lines.len() + 1)).collect();
        cuts.insert(lines.len());
        let mut start = 0;
        for cut in cuts {
            swapper.run(&mut merger, &lines[start..cut]).unwrap();
            start = cut;
        }
        let stats = swapper.close().unwrap();

        // each partner row joins the first publisher row with its key: lowest
        // shard, then file order
        let first_match = |key: u16| {
            sorted_shards.iter().enumerate().find_map(|(shard, keys)| {
                keys.iter().position(|k| *k == key).map(|rank| format!("s{shard}_{rank}"))
            })
        };
        let mut expected = String::from("publisher_user_id,partner_user_id\n");
        for (i, key) in partner_keys.iter().enumerate() {
            if let Some(user) = first_match(*key) {
                expected.push_str(&format!("{user},q{i}\n"));
            }
        }
        let written = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        prop_assert_eq!(&written, &expected);
        prop_assert_eq!(stats.matched as usize, expected.lines().count() - 1);
        prop_assert_eq!(stats.counterparty_rows as usize, partner_keys.len());
    }

    #[test]
    fn split_chunk_keeps_every_record(
        rows in prop::collection::vec("[A-Z0-9]{1,8},[a-z0-9]{1,8}", 0..20),
        padding in 1usize..32,
    ) {
        let mut chunk: Vec<u8> =
            rows.iter().flat_map(|r| format!("{r}\n").into_bytes()).collect();
        let len = chunk.len();
        chunk.resize(len + padding, 0);
        let lines = split_chunk(&chunk).unwrap();
        prop_assert_eq!(lines.last().map(String::as_str), Some(""));
        prop_assert_eq!(&lines[..lines.len() - 1], rows.as_slice());
    }
}
