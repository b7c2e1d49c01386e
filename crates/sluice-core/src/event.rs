//! Change-event model.
//!
//! Events are produced by an upstream log reader, buffered by the store,
//! and delivered to downstream consumers in batches. An event is immutable
//! once stored, except that its payload may be released (set to empty)
//! after acknowledgment to free memory while keeping the metadata needed
//! for position queries.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Coarse classification of a buffered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Start of a source transaction.
    TransactionBegin,
    /// End of a source transaction.
    TransactionEnd,
    /// Row-level data change.
    RowData,
    /// Structural (schema) change.
    SchemaChange,
}

/// Fine-grained classification of the change carried by an event.
///
/// This is a closed enum: schema-change detection is a total function over
/// it rather than a scattered set of equality checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Row insert.
    Insert,
    /// Row update.
    Update,
    /// Row delete.
    Delete,
    /// `ALTER` statement.
    Alter,
    /// `CREATE` statement.
    Create,
    /// `DROP` statement.
    Drop,
    /// `RENAME` statement.
    Rename,
    /// `TRUNCATE` statement.
    Truncate,
    /// Index creation.
    IndexCreate,
    /// Index removal.
    IndexDrop,
    /// Source heartbeat, no row data.
    Heartbeat,
    /// Uncategorized statement.
    Query,
}

impl ChangeKind {
    /// Returns the change kind as a short code string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
            ChangeKind::Alter => "alter",
            ChangeKind::Create => "create",
            ChangeKind::Drop => "drop",
            ChangeKind::Rename => "rename",
            ChangeKind::Truncate => "truncate",
            ChangeKind::IndexCreate => "index-create",
            ChangeKind::IndexDrop => "index-drop",
            ChangeKind::Heartbeat => "heartbeat",
            ChangeKind::Query => "query",
        }
    }

    /// Returns true for changes that alter table structure.
    ///
    /// These are the events subject to batch isolation: a schema change is
    /// never delivered in the same batch as row-data changes.
    #[must_use]
    pub fn is_schema_change(self) -> bool {
        matches!(
            self,
            ChangeKind::Alter
                | ChangeKind::Create
                | ChangeKind::Drop
                | ChangeKind::Rename
                | ChangeKind::Truncate
                | ChangeKind::IndexCreate
                | ChangeKind::IndexDrop
        )
    }
}

/// A single buffered change event.
///
/// Carries the source log coordinates (`journal_name` + `offset`) used to
/// build resumable positions, the origin timestamp and server identity,
/// and the raw change body. `byte_size` is the accounting size recorded by
/// the upstream parser; it stays valid after the payload is released.
#[derive(Debug, Clone)]
pub struct Event {
    entry_kind: EntryKind,
    change_kind: ChangeKind,
    journal_name: String,
    offset: u64,
    execute_time_ms: i64,
    server_id: u64,
    gtid: Option<String>,
    rows_affected: u64,
    byte_size: usize,
    source_address: String,
    payload: Bytes,
}

impl Event {
    /// Starts building an event for the given source log coordinates.
    #[must_use]
    pub fn builder(journal_name: impl Into<String>, offset: u64) -> EventBuilder {
        EventBuilder::new(journal_name, offset)
    }

    /// Coarse entry classification.
    #[must_use]
    pub fn entry_kind(&self) -> EntryKind {
        self.entry_kind
    }

    /// Fine-grained change classification.
    #[must_use]
    pub fn change_kind(&self) -> ChangeKind {
        self.change_kind
    }

    /// Source log file identifier.
    #[must_use]
    pub fn journal_name(&self) -> &str {
        &self.journal_name
    }

    /// Byte position within the source log file.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Origin timestamp in milliseconds.
    #[must_use]
    pub fn execute_time_ms(&self) -> i64 {
        self.execute_time_ms
    }

    /// Identity of the originating database instance.
    #[must_use]
    pub fn server_id(&self) -> u64 {
        self.server_id
    }

    /// Global transaction id, present only for globally-ordered
    /// transaction systems.
    #[must_use]
    pub fn gtid(&self) -> Option<&str> {
        self.gtid.as_deref()
    }

    /// Number of rows affected by this change.
    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Accounting size in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Identity of the log-producing host.
    #[must_use]
    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    /// Raw change body. Empty once the payload has been released.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// True while the raw change body is still held.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }

    /// True when this event carries a gtid that is neither absent nor blank.
    #[must_use]
    pub fn has_gtid(&self) -> bool {
        self.gtid.as_deref().is_some_and(|g| !g.is_empty())
    }

    /// Whether this event is a structural change.
    #[must_use]
    pub fn is_schema_change(&self) -> bool {
        self.change_kind.is_schema_change()
    }

    /// Drops the raw change body, keeping all metadata.
    ///
    /// `byte_size` is unaffected so accounting stays consistent with what
    /// was recorded when the event entered the store.
    pub fn release_payload(&mut self) {
        self.payload = Bytes::new();
    }
}

/// Builder for [`Event`].
#[derive(Debug)]
pub struct EventBuilder {
    entry_kind: EntryKind,
    change_kind: ChangeKind,
    journal_name: String,
    offset: u64,
    execute_time_ms: i64,
    server_id: u64,
    gtid: Option<String>,
    rows_affected: u64,
    byte_size: Option<usize>,
    source_address: String,
    payload: Bytes,
}

impl EventBuilder {
    fn new(journal_name: impl Into<String>, offset: u64) -> Self {
        Self {
            entry_kind: EntryKind::RowData,
            change_kind: ChangeKind::Insert,
            journal_name: journal_name.into(),
            offset,
            execute_time_ms: 0,
            server_id: 0,
            gtid: None,
            rows_affected: 0,
            byte_size: None,
            source_address: String::new(),
            payload: Bytes::new(),
        }
    }

    /// Sets the coarse entry classification.
    #[must_use]
    pub fn entry_kind(mut self, kind: EntryKind) -> Self {
        self.entry_kind = kind;
        self
    }

    /// Sets the fine-grained change classification.
    #[must_use]
    pub fn change_kind(mut self, kind: ChangeKind) -> Self {
        self.change_kind = kind;
        self
    }

    /// Sets the origin timestamp in milliseconds.
    #[must_use]
    pub fn execute_time_ms(mut self, timestamp: i64) -> Self {
        self.execute_time_ms = timestamp;
        self
    }

    /// Sets the originating server identity.
    #[must_use]
    pub fn server_id(mut self, server_id: u64) -> Self {
        self.server_id = server_id;
        self
    }

    /// Sets the global transaction id.
    #[must_use]
    pub fn gtid(mut self, gtid: impl Into<String>) -> Self {
        self.gtid = Some(gtid.into());
        self
    }

    /// Sets the affected-row count.
    #[must_use]
    pub fn rows_affected(mut self, rows: u64) -> Self {
        self.rows_affected = rows;
        self
    }

    /// Sets the accounting size explicitly.
    ///
    /// Defaults to the payload length when not set.
    #[must_use]
    pub fn byte_size(mut self, size: usize) -> Self {
        self.byte_size = Some(size);
        self
    }

    /// Sets the log-producing host identity.
    #[must_use]
    pub fn source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = address.into();
        self
    }

    /// Sets the raw change body.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Finishes building the event.
    #[must_use]
    pub fn build(self) -> Event {
        let byte_size = self.byte_size.unwrap_or(self.payload.len());
        Event {
            entry_kind: self.entry_kind,
            change_kind: self.change_kind,
            journal_name: self.journal_name,
            offset: self.offset,
            execute_time_ms: self.execute_time_ms,
            server_id: self.server_id,
            gtid: self.gtid,
            rows_affected: self.rows_affected,
            byte_size,
            source_address: self.source_address,
            payload: self.payload,
        }
    }
}
