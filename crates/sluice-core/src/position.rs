//! Resumable positions in the source log stream.
//!
//! A [`Position`] is the externally meaningful resume coordinate for a
//! consumer: source log file plus offset, origin timestamp, and source
//! identity. It is distinct from the store's internal sequence numbers,
//! which are private to one store instance and do not survive restarts.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// A resume coordinate in the upstream change log.
///
/// `included` disambiguates how the position is consumed on resume: `true`
/// means the event at this position was already delivered and must be
/// re-delivered (inclusive resume); `false` means delivery continues after
/// it (exclusive resume).
///
/// A position whose `journal_name` and `offset` are both absent matches
/// events by timestamp alone; see [`Position::matches`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Source log file identifier, if known.
    pub journal_name: Option<String>,
    /// Byte position within the log file, if known.
    pub offset: Option<u64>,
    /// Origin timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Identity of the originating database instance, if known.
    pub server_id: Option<u64>,
    /// Global transaction id, if the source provides one.
    pub gtid: Option<String>,
    /// Whether the event at this position has already been delivered.
    pub included: bool,
    /// Identity of the log-producing host, if known.
    pub source_address: Option<String>,
}

impl Position {
    /// Builds the position of a stored event.
    #[must_use]
    pub fn from_event(event: &Event, included: bool) -> Self {
        Self {
            journal_name: Some(event.journal_name().to_string()),
            offset: Some(event.offset()),
            timestamp_ms: event.execute_time_ms(),
            server_id: Some(event.server_id()),
            gtid: event.gtid().map(str::to_string),
            included,
            source_address: Some(event.source_address().to_string()),
        }
    }

    /// Builds a timestamp-only position.
    ///
    /// Such a position matches any event with the same origin timestamp,
    /// which is how consumers resume when the exact log coordinates were
    /// lost (for example after a source failover).
    #[must_use]
    pub fn at_timestamp(timestamp_ms: i64) -> Self {
        Self {
            journal_name: None,
            offset: None,
            timestamp_ms,
            server_id: None,
            gtid: None,
            included: false,
            source_address: None,
        }
    }

    /// Ack match predicate: does this position identify the given event?
    ///
    /// The timestamp must match exactly. When the position carries journal
    /// coordinates they must match too; a position without them matches on
    /// timestamp alone.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self.timestamp_ms != event.execute_time_ms() {
            return false;
        }
        let timestamp_only =
            self.journal_name.as_deref().map_or(true, str::is_empty) && self.offset.is_none();
        if timestamp_only {
            return true;
        }
        self.offset == Some(event.offset())
            && self.journal_name.as_deref() == Some(event.journal_name())
    }

    /// Returns the earlier of two positions, preferring `a` on ties.
    ///
    /// Positions from the same source host compare by journal name and
    /// then offset; positions from different hosts can only be compared by
    /// timestamp.
    #[must_use]
    pub fn min<'a>(a: &'a Position, b: &'a Position) -> &'a Position {
        if a.source_address == b.source_address {
            match a.journal_name.cmp(&b.journal_name) {
                Ordering::Greater => b,
                Ordering::Less => a,
                Ordering::Equal => {
                    if a.offset > b.offset {
                        b
                    } else {
                        a
                    }
                }
            }
        } else if a.timestamp_ms > b.timestamp_ms {
            b
        } else {
            a
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.journal_name.as_deref(), self.offset) {
            (Some(journal), Some(offset)) => {
                write!(f, "{journal}:{offset} at {}", self.timestamp_ms)
            }
            _ => write!(f, "timestamp {}", self.timestamp_ms),
        }
    }
}

/// The position window covered by one delivered batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRange {
    /// Position of the first event in the batch.
    pub start: Position,
    /// Position of the last event in the batch.
    pub end: Position,
    /// The only position in the batch that is safe to acknowledge as a
    /// unit, when one exists.
    ///
    /// Absent when the batch contains no transaction boundary or schema
    /// change; such a batch must not be acknowledged in isolation.
    pub ack: Option<Position>,
    /// Internal sequence of the last event; callers may hand it back to
    /// `ack_with_hint` to pin the scan.
    pub end_seq: i64,
}
