//! Tests for IndexedReader
//!
//! These tests verify:
//! - Positional access, including negative positions
//! - Slicing and iteration match repeated `get`
//! - Reopening with a valid index skips the rebuild
//! - In-memory index for streams without an index file
//! - Close semantics

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use idxstore::{
    default_index_path, IndexedReader, IndexedWriter, JsonLineCodec, MsgpackCodec,
    ReaderOptions, ReaderState, SliceSpec, StoreError, TextCodec,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_file(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    (temp_dir, path)
}

fn write_lines(path: &Path, count: usize) -> Vec<String> {
    let lines: Vec<String> = (0..count).map(|i| format!("line {}", i)).collect();
    let mut writer = IndexedWriter::create(path, TextCodec::new()).unwrap();
    writer.extend(&lines).unwrap();
    writer.close().unwrap();
    lines
}

fn collect<I: Iterator<Item = idxstore::Result<String>>>(records: I) -> Vec<String> {
    records.map(|record| record.unwrap()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Event {
    id: u64,
    name: String,
    tags: Vec<String>,
}

// =============================================================================
// Basic Access Tests
// =============================================================================

#[test]
fn test_read_jsonline_records() {
    let (_temp, path) = setup_temp_file("records.jsonl");
    let mut writer = IndexedWriter::create(&path, JsonLineCodec::<Value>::new()).unwrap();
    writer.append(&json!({"key": "value"})).unwrap();
    writer.append(&json!({"number": 123})).unwrap();
    writer.close().unwrap();

    let mut reader = IndexedReader::open(&path, JsonLineCodec::<Value>::new()).unwrap();

    assert_eq!(reader.len(), 2);
    assert_eq!(reader.get(0).unwrap(), json!({"key": "value"}));
    assert_eq!(reader.get(1).unwrap(), json!({"number": 123}));
    assert_eq!(reader.state(), ReaderState::Open);
    assert!(!reader.was_rebuilt());
}

#[test]
fn test_read_text_records() {
    let (_temp, path) = setup_temp_file("lines.txt");
    let mut writer = IndexedWriter::create(&path, TextCodec::new()).unwrap();
    writer.append(&"Hello, World!".to_string()).unwrap();
    writer.append(&"This is a test.".to_string()).unwrap();
    writer.close().unwrap();

    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    assert_eq!(reader.len(), 2);
    assert_eq!(reader.get(0).unwrap(), "Hello, World!");
    assert_eq!(reader.get(1).unwrap(), "This is a test.");
}

#[test]
fn test_read_msgpack_structs() {
    let (_temp, path) = setup_temp_file("events.msgpack");
    let events: Vec<Event> = (0..5)
        .map(|i| Event {
            id: i,
            name: format!("event-{}", i),
            tags: vec!["a".to_string(); i as usize],
        })
        .collect();

    let mut writer = IndexedWriter::create(&path, MsgpackCodec::<Event>::new()).unwrap();
    writer.extend(&events).unwrap();
    writer.close().unwrap();

    let mut reader = IndexedReader::open(&path, MsgpackCodec::<Event>::new()).unwrap();

    assert_eq!(reader.len(), 5);
    assert_eq!(reader.get(3).unwrap(), events[3]);
    let all: Vec<Event> = reader.iter().unwrap().map(|e| e.unwrap()).collect();
    assert_eq!(all, events);
}

#[test]
fn test_empty_file() {
    let (_temp, path) = setup_temp_file("empty.txt");
    fs::write(&path, b"").unwrap();

    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    assert_eq!(reader.len(), 0);
    assert!(reader.is_empty());
    assert!(matches!(reader.get(0), Err(StoreError::OutOfRange { .. })));
    assert_eq!(reader.iter().unwrap().count(), 0);
}

#[test]
fn test_missing_data_file() {
    let (_temp, path) = setup_temp_file("missing.txt");

    let result = IndexedReader::open(&path, TextCodec::new());

    assert!(matches!(result, Err(StoreError::Io(_))));
}

// =============================================================================
// Negative Index Tests
// =============================================================================

#[test]
fn test_negative_indexing() {
    let (_temp, path) = setup_temp_file("lines.txt");
    let lines = write_lines(&path, 5);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    assert_eq!(reader.get(-1).unwrap(), lines[4]);
    assert_eq!(reader.get(-5).unwrap(), lines[0]);
    assert!(matches!(
        reader.get(-6),
        Err(StoreError::OutOfRange { index: -6, len: 5 })
    ));
    assert!(matches!(
        reader.get(5),
        Err(StoreError::OutOfRange { index: 5, len: 5 })
    ));
}

#[test]
fn test_repeated_get_rereads() {
    let (_temp, path) = setup_temp_file("lines.txt");
    let lines = write_lines(&path, 3);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    for _ in 0..3 {
        assert_eq!(reader.get(2).unwrap(), lines[2]);
        assert_eq!(reader.get(0).unwrap(), lines[0]);
    }
}

// =============================================================================
// Slice and Iteration Tests
// =============================================================================

#[test]
fn test_iter_matches_get() {
    let (_temp, path) = setup_temp_file("lines.txt");
    let lines = write_lines(&path, 50);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    let via_get: Vec<String> = (0..50).map(|i| reader.get(i).unwrap()).collect();
    let via_iter = collect(reader.iter().unwrap());

    assert_eq!(via_iter, lines);
    assert_eq!(via_get, lines);
}

#[test]
fn test_slice_matches_list_slicing() {
    let (_temp, path) = setup_temp_file("lines.txt");
    let lines = write_lines(&path, 10);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    let cases: Vec<(SliceSpec, Vec<usize>)> = vec![
        (SliceSpec::from(2..8).step(2), vec![2, 4, 6]),
        (SliceSpec::full().step(-1), (0..10).rev().collect()),
        (SliceSpec::from(-3..), vec![7, 8, 9]),
        (SliceSpec::from(..-7), vec![0, 1, 2]),
        (SliceSpec::new(Some(8), Some(2), Some(-3)), vec![8, 5]),
        (SliceSpec::from(100..), vec![]),
        (SliceSpec::from(-100..3), vec![0, 1, 2]),
        (SliceSpec::new(Some(5), Some(1), None), vec![]),
        (SliceSpec::full().step(3), vec![0, 3, 6, 9]),
    ];

    for (spec, positions) in cases {
        let expected: Vec<String> = positions.iter().map(|&i| lines[i].clone()).collect();
        assert_eq!(collect(reader.slice(spec).unwrap()), expected, "slice {}", spec);
    }
}

#[test]
fn test_slice_accepts_ranges() {
    let (_temp, path) = setup_temp_file("lines.txt");
    let lines = write_lines(&path, 6);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    assert_eq!(collect(reader.slice(1..3).unwrap()), lines[1..3].to_vec());
    assert_eq!(collect(reader.slice(4..).unwrap()), lines[4..].to_vec());
    assert_eq!(collect(reader.slice(..2).unwrap()), lines[..2].to_vec());
    assert_eq!(collect(reader.slice(..).unwrap()), lines);
}

#[test]
fn test_slice_size_hint() {
    let (_temp, path) = setup_temp_file("lines.txt");
    write_lines(&path, 10);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    let mut records = reader.slice(SliceSpec::full().step(4)).unwrap();
    assert_eq!(records.len(), 3);
    records.next().unwrap().unwrap();
    assert_eq!(records.remaining(), 2);
}

#[test]
fn test_zero_step_slice() {
    let (_temp, path) = setup_temp_file("lines.txt");
    write_lines(&path, 3);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    let result = reader.slice(SliceSpec::full().step(0));

    assert!(matches!(result, Err(StoreError::InvalidSlice(_))));
}

#[test]
fn test_slice_with_extreme_step() {
    let (_temp, path) = setup_temp_file("lines.txt");
    let lines = write_lines(&path, 5);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    let forward = reader.slice(SliceSpec::new(Some(1), Some(3), Some(i64::MAX))).unwrap();
    assert_eq!(collect(forward), vec![lines[1].clone()]);

    let backward = reader.slice(SliceSpec::full().step(i64::MIN)).unwrap();
    assert_eq!(collect(backward), vec![lines[4].clone()]);

    let wide = reader.slice(SliceSpec::new(Some(i64::MIN), Some(i64::MAX), None)).unwrap();
    assert_eq!(collect(wide), lines);
}

#[test]
fn test_offsets_dump() {
    let (_temp, path) = setup_temp_file("lines.txt");
    write_lines(&path, 3);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    // "line 0\n" is 7 bytes
    assert_eq!(reader.offsets().unwrap(), vec![0, 7, 14]);
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_first_open_builds_index() {
    let (_temp, path) = setup_temp_file("plain.txt");
    fs::write(&path, "alpha\nbeta\ngamma\n").unwrap();
    let index_path = default_index_path(&path);
    assert!(!index_path.exists());

    let reader = IndexedReader::open(&path, TextCodec::new()).unwrap();
    assert!(reader.was_rebuilt());
    assert_eq!(reader.index_path(), Some(index_path.as_path()));
    assert!(index_path.exists());

    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();
    assert!(!reader.was_rebuilt());
    assert_eq!(reader.get(1).unwrap(), "beta");
}

#[test]
fn test_progress_callback() {
    let (_temp, path) = setup_temp_file("plain.txt");
    fs::write(&path, "a\nb\nc\nd\ne\n").unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let options = ReaderOptions::builder()
        .on_rebuild_progress(move |count| sink.lock().unwrap().push(count))
        .build();
    let reader = IndexedReader::open_with(&path, TextCodec::new(), options).unwrap();

    assert_eq!(reader.len(), 5);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_progress_callback_not_called_for_valid_index() {
    let (_temp, path) = setup_temp_file("lines.txt");
    write_lines(&path, 4);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let options = ReaderOptions::builder()
        .on_rebuild_progress(move |count| sink.lock().unwrap().push(count))
        .build();
    IndexedReader::open_with(&path, TextCodec::new(), options).unwrap();

    assert!(seen.lock().unwrap().is_empty());
}

// =============================================================================
// In-Memory Index Tests
// =============================================================================

#[test]
fn test_stream_without_index_path() {
    let data = Cursor::new(b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n".to_vec());

    let mut reader =
        IndexedReader::from_stream(data, None, JsonLineCodec::<Value>::new(), ReaderOptions::default())
            .unwrap();

    assert!(reader.was_rebuilt());
    assert_eq!(reader.index_path(), None);
    assert_eq!(reader.len(), 3);
    assert_eq!(reader.get(-1).unwrap(), json!({"c": 3}));
    assert_eq!(reader.offsets().unwrap(), vec![0, 8, 16]);
}

#[test]
fn test_stream_with_separate_index_path() {
    let (_temp, index_path) = setup_temp_file("elsewhere.idx");
    let data = b"x\ny\n".to_vec();

    let reader = IndexedReader::from_stream(
        Cursor::new(data.clone()),
        Some(index_path.clone()),
        TextCodec::new(),
        ReaderOptions::default(),
    )
    .unwrap();
    assert!(reader.was_rebuilt());
    assert!(index_path.exists());

    let mut reader = IndexedReader::from_stream(
        Cursor::new(data),
        Some(index_path),
        TextCodec::new(),
        ReaderOptions::default(),
    )
    .unwrap();
    assert!(!reader.was_rebuilt());
    assert_eq!(reader.get(1).unwrap(), "y");
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_is_idempotent() {
    let (_temp, path) = setup_temp_file("lines.txt");
    write_lines(&path, 2);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();

    reader.close().unwrap();
    reader.close().unwrap();

    assert_eq!(reader.state(), ReaderState::Closed);
}

#[test]
fn test_access_after_close() {
    let (_temp, path) = setup_temp_file("lines.txt");
    write_lines(&path, 2);
    let mut reader = IndexedReader::open(&path, TextCodec::new()).unwrap();
    reader.close().unwrap();

    assert!(matches!(reader.get(0), Err(StoreError::Closed(_))));
    assert!(matches!(reader.slice(..), Err(StoreError::Closed(_))));
    assert!(matches!(reader.iter(), Err(StoreError::Closed(_))));
    assert!(matches!(reader.offsets(), Err(StoreError::Closed(_))));
}

#[test]
fn test_into_inner_respects_close_stream_option() {
    let data = b"a\nb\n".to_vec();

    let mut reader = IndexedReader::from_stream(
        Cursor::new(data.clone()),
        None,
        TextCodec::new(),
        ReaderOptions::builder().close_stream_on_close(false).build(),
    )
    .unwrap();
    reader.close().unwrap();
    let stream = reader.into_inner().unwrap();
    assert_eq!(stream.into_inner(), data);

    let mut reader = IndexedReader::from_stream(
        Cursor::new(data),
        None,
        TextCodec::new(),
        ReaderOptions::default(),
    )
    .unwrap();
    reader.close().unwrap();
    assert!(reader.into_inner().is_none());
}
