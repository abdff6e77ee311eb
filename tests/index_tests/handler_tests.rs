//! Tests for IndexHandler and IndexHandlerWriter
//!
//! These tests verify:
//! - Header creation and validation
//! - Offset get/put/append, including negative positions
//! - Record count derived from stream length
//! - Paged offset scans across page boundaries
//! - Sequential-write enforcement in the writer

use std::io::Cursor;

use idxstore::index::{
    encode_index, IndexHandler, IndexHandlerWriter, InvalidIndex, ENTRY_SIZE, HEADER_SIZE,
    INDEX_MAGIC,
};
use idxstore::StoreError;

// =============================================================================
// Helper Functions
// =============================================================================

fn empty_handler() -> IndexHandler<Cursor<Vec<u8>>> {
    IndexHandler::create(Cursor::new(Vec::new())).unwrap()
}

fn handler_with(offsets: &[u64]) -> IndexHandler<Cursor<Vec<u8>>> {
    IndexHandler::new(Cursor::new(encode_index(offsets))).unwrap()
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_create_writes_magic_header() {
    let handler = empty_handler();

    assert_eq!(handler.count(), 0);
    assert!(handler.is_empty());
    assert_eq!(handler.into_inner().into_inner(), INDEX_MAGIC.to_vec());
}

#[test]
fn test_check_header() {
    let mut handler = handler_with(&[0, 10]);
    assert!(handler.check_header());

    let mut bytes = encode_index(&[0, 10]);
    bytes[0] = b'X';
    let mut handler = IndexHandler::new(Cursor::new(bytes)).unwrap();
    assert!(!handler.check_header());
}

#[test]
fn test_write_header_on_non_empty_stream() {
    let mut handler = handler_with(&[0]);

    let result = handler.write_header();

    assert!(matches!(
        result,
        Err(StoreError::HeaderOnNonEmpty { len }) if len == HEADER_SIZE + ENTRY_SIZE
    ));
    // Existing content untouched
    assert_eq!(handler.count(), 1);
    assert_eq!(handler.get(0).unwrap(), 0);
}

// =============================================================================
// Count Tests
// =============================================================================

#[test]
fn test_count_from_length() {
    let handler = handler_with(&[0, 5, 9, 14]);
    assert_eq!(handler.count(), 4);
}

#[test]
fn test_new_rejects_short_stream() {
    let result = IndexHandler::new(Cursor::new(b"ID".to_vec()));

    assert!(matches!(
        result,
        Err(StoreError::CorruptIndex(InvalidIndex::TooShort { len: 2 }))
    ));
}

#[test]
fn test_new_rejects_partial_entry() {
    let mut bytes = encode_index(&[0, 5]);
    bytes.extend_from_slice(&[1, 2, 3]);

    let result = IndexHandler::new(Cursor::new(bytes));

    assert!(matches!(
        result,
        Err(StoreError::CorruptIndex(InvalidIndex::TrailingBytes { extra: 3 }))
    ));
}

// =============================================================================
// Get/Put Tests
// =============================================================================

#[test]
fn test_append_and_get() {
    let mut handler = empty_handler();
    handler.append(0).unwrap();
    handler.append(16).unwrap();
    handler.append(31).unwrap();

    assert_eq!(handler.count(), 3);
    assert_eq!(handler.get(0).unwrap(), 0);
    assert_eq!(handler.get(1).unwrap(), 16);
    assert_eq!(handler.get(2).unwrap(), 31);
}

#[test]
fn test_get_negative_index() {
    let mut handler = handler_with(&[0, 16, 31]);

    assert_eq!(handler.get(-1).unwrap(), 31);
    assert_eq!(handler.get(-3).unwrap(), 0);
    assert_eq!(handler.last().unwrap(), Some(31));
}

#[test]
fn test_get_out_of_range() {
    let mut handler = handler_with(&[0, 16]);

    assert!(matches!(
        handler.get(2),
        Err(StoreError::OutOfRange { index: 2, len: 2 })
    ));
    assert!(matches!(
        handler.get(-3),
        Err(StoreError::OutOfRange { index: -3, len: 2 })
    ));
}

#[test]
fn test_last_on_empty() {
    let mut handler = empty_handler();
    assert_eq!(handler.last().unwrap(), None);
}

#[test]
fn test_put_overwrites_existing_entry() {
    let mut handler = handler_with(&[0, 16, 31]);

    handler.put(1, 20).unwrap();

    assert_eq!(handler.count(), 3);
    assert_eq!(handler.get(1).unwrap(), 20);
    assert_eq!(handler.get(2).unwrap(), 31);
}

#[test]
fn test_put_past_end_fails() {
    let mut handler = handler_with(&[0]);

    let result = handler.put(2, 40);

    assert!(matches!(result, Err(StoreError::OutOfRange { .. })));
    assert_eq!(handler.count(), 1);
}

#[test]
fn test_entries_are_little_endian() {
    let mut handler = empty_handler();
    handler.append(0x0102).unwrap();

    let bytes = handler.into_inner().into_inner();
    assert_eq!(&bytes[..4], INDEX_MAGIC);
    assert_eq!(&bytes[4..], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_spans_multiple_pages() {
    // 16 KB pages hold 2048 entries
    let offsets: Vec<u64> = (0..5000u64).map(|i| i * 7).collect();
    let mut handler = handler_with(&offsets);

    assert_eq!(handler.scan().unwrap(), offsets);
}

#[test]
fn test_offsets_range_is_clamped() {
    let mut handler = handler_with(&[0, 3, 6, 9]);

    assert_eq!(handler.offsets(1..3).unwrap(), vec![3, 6]);
    assert_eq!(handler.offsets(2..100).unwrap(), vec![6, 9]);
    assert!(handler.offsets(10..20).unwrap().is_empty());
}

#[test]
fn test_interleaved_reads_and_writes() {
    let mut handler = empty_handler();
    for i in 0..10u64 {
        handler.append(i * 100).unwrap();
        assert_eq!(handler.get(0).unwrap(), 0);
        assert_eq!(handler.get(-1).unwrap(), i * 100);
    }
    assert_eq!(handler.scan().unwrap().len(), 10);
}

// =============================================================================
// IndexHandlerWriter Tests
// =============================================================================

#[test]
fn test_writer_on_empty_stream_writes_header() {
    let writer = IndexHandlerWriter::from_stream(Cursor::new(Vec::new())).unwrap();

    assert_eq!(writer.count(), 0);
    assert_eq!(writer.last_offset(), None);
    assert_eq!(writer.into_inner().into_inner(), INDEX_MAGIC.to_vec());
}

#[test]
fn test_writer_resumes_existing_stream() {
    let mut writer = IndexHandlerWriter::from_stream(Cursor::new(encode_index(&[0, 12]))).unwrap();

    assert_eq!(writer.count(), 2);
    assert_eq!(writer.last_offset(), Some(12));

    writer.append(30).unwrap();
    writer.commit().unwrap();

    assert_eq!(writer.into_inner().into_inner(), encode_index(&[0, 12, 30]));
}

#[test]
fn test_writer_rejects_out_of_order_put() {
    let mut writer = IndexHandlerWriter::from_stream(Cursor::new(Vec::new())).unwrap();
    writer.put(0, 0).unwrap();

    let result = writer.put(2, 20);

    assert!(matches!(
        result,
        Err(StoreError::OutOfOrderPut {
            expected: 1,
            got: 2
        })
    ));
    assert!(matches!(
        writer.put(0, 20),
        Err(StoreError::OutOfOrderPut {
            expected: 1,
            got: 0
        })
    ));
    assert_eq!(writer.count(), 1);
}

#[test]
fn test_writer_rejects_offset_regression() {
    let mut writer = IndexHandlerWriter::from_stream(Cursor::new(encode_index(&[0, 50]))).unwrap();

    let result = writer.append(40);

    assert!(matches!(
        result,
        Err(StoreError::OffsetRegression {
            previous: 50,
            offset: 40
        })
    ));
    assert_eq!(writer.count(), 2);
}

#[test]
fn test_writer_rejects_corrupt_stream() {
    let mut bytes = encode_index(&[0]);
    bytes.push(7);
    assert!(matches!(
        IndexHandlerWriter::from_stream(Cursor::new(bytes)),
        Err(StoreError::CorruptIndex(InvalidIndex::TrailingBytes { extra: 1 }))
    ));

    let mut bytes = encode_index(&[0]);
    bytes[..4].copy_from_slice(b"NOPE");
    assert!(matches!(
        IndexHandlerWriter::from_stream(Cursor::new(bytes)),
        Err(StoreError::CorruptIndex(InvalidIndex::BadHeader))
    ));
}
