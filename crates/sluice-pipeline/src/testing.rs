//! Deterministic event builders for tests.
//!
//! Real events come from a binlog parser; tests need plausible stand-ins
//! with controllable coordinates. Offsets and timestamps are derived from
//! the caller's inputs only, so sequences are reproducible.

use sluice_core::{ChangeKind, EntryKind, Event};

/// Source address used by every generated event.
pub const TEST_SOURCE: &str = "10.0.0.5:3306";

/// A row-data insert at the given log coordinates.
#[must_use]
pub fn row(journal: &str, offset: u64, timestamp_ms: i64) -> Event {
    Event::builder(journal, offset)
        .entry_kind(EntryKind::RowData)
        .change_kind(ChangeKind::Insert)
        .execute_time_ms(timestamp_ms)
        .server_id(1)
        .rows_affected(1)
        .byte_size(64)
        .source_address(TEST_SOURCE)
        .build()
}

/// A row-data event with an explicit accounting size.
#[must_use]
pub fn row_sized(journal: &str, offset: u64, timestamp_ms: i64, byte_size: usize) -> Event {
    Event::builder(journal, offset)
        .entry_kind(EntryKind::RowData)
        .change_kind(ChangeKind::Insert)
        .execute_time_ms(timestamp_ms)
        .server_id(1)
        .rows_affected(1)
        .byte_size(byte_size)
        .source_address(TEST_SOURCE)
        .build()
}

/// A schema change (`ALTER`) at the given log coordinates.
#[must_use]
pub fn schema_change(journal: &str, offset: u64, timestamp_ms: i64) -> Event {
    Event::builder(journal, offset)
        .entry_kind(EntryKind::RowData)
        .change_kind(ChangeKind::Alter)
        .execute_time_ms(timestamp_ms)
        .server_id(1)
        .byte_size(128)
        .source_address(TEST_SOURCE)
        .build()
}

/// A complete transaction: begin, `rows` inserts, end.
///
/// Events are laid out 16 bytes apart starting at `first_offset`, all
/// stamped with `timestamp_ms`. Pass a gtid to mark the transaction as
/// globally ordered (the begin then stops being an ack-eligible point).
#[must_use]
pub fn transaction(
    journal: &str,
    first_offset: u64,
    timestamp_ms: i64,
    rows: usize,
    gtid: Option<&str>,
) -> Vec<Event> {
    let mut events = Vec::with_capacity(rows + 2);
    let mut offset = first_offset;

    let mut begin = Event::builder(journal, offset)
        .entry_kind(EntryKind::TransactionBegin)
        .change_kind(ChangeKind::Query)
        .execute_time_ms(timestamp_ms)
        .server_id(1)
        .byte_size(16)
        .source_address(TEST_SOURCE);
    if let Some(gtid) = gtid {
        begin = begin.gtid(gtid);
    }
    events.push(begin.build());

    for _ in 0..rows {
        offset += 16;
        events.push(row(journal, offset, timestamp_ms));
    }

    offset += 16;
    events.push(
        Event::builder(journal, offset)
            .entry_kind(EntryKind::TransactionEnd)
            .change_kind(ChangeKind::Query)
            .execute_time_ms(timestamp_ms)
            .server_id(1)
            .byte_size(16)
            .source_address(TEST_SOURCE)
            .build(),
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_shape() {
        let events = transaction("bin.01", 100, 5000, 3, None);
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].entry_kind(), EntryKind::TransactionBegin);
        assert_eq!(events[4].entry_kind(), EntryKind::TransactionEnd);
        assert!(events[1..4]
            .iter()
            .all(|e| e.entry_kind() == EntryKind::RowData));
        // Offsets increase monotonically.
        for pair in events.windows(2) {
            assert!(pair[0].offset() < pair[1].offset());
        }
    }

    #[test]
    fn test_gtid_marks_begin() {
        let events = transaction("bin.01", 100, 5000, 1, Some("uuid:7"));
        assert!(events[0].has_gtid());
        assert!(!events[2].has_gtid());
    }

    #[test]
    fn test_schema_change_classification() {
        assert!(schema_change("bin.01", 4, 100).is_schema_change());
        assert!(!row("bin.01", 4, 100).is_schema_change());
    }
}
