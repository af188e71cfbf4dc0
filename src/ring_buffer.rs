// src/ring_buffer.rs
//! Ring buffer log sink with bounded memory.
//!
//! Keeps the most recent dispatcher log events in a fixed-size buffer with
//! FIFO eviction. Useful for in-process diagnostics endpoints and for
//! asserting on log output in tests.
//!
//! # Design Principles
//!
//! - **Bounded memory**: Fixed maximum size regardless of failure volume
//! - **FIFO eviction**: Oldest entries dropped first
//! - **Per-entry size caps**: No single failure can dominate the buffer
//! - **RwLock-based**: Concurrent readers, exclusive writers
//!
//! # Example
//!
//! ```rust
//! use faultgate::ring_buffer::{RingBufferLogSink, Severity};
//! use faultgate::{Failure, LogSink};
//!
//! // Max 1000 entries, 2KB per entry = 2MB total
//! let sink = RingBufferLogSink::new(1000, 2048);
//!
//! sink.info("a business rule was violated", Some(&Failure::generic("bad input")));
//!
//! let recent = sink.get_recent(10);
//! assert_eq!(recent[0].severity, Severity::Info);
//! ```

use crate::{Failure, LogSink};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Log level of a recorded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Client faults and access denials.
    Info,
    /// Server faults.
    Error,
}

/// A single recorded log event with bounded size.
///
/// Uses `Arc<str>` so cloning entries out of the buffer is a refcount bump.
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// Unix timestamp of the log call
    pub timestamp: u64,
    /// Log level
    pub severity: Severity,
    /// Log message
    pub message: Arc<str>,
    /// Correlation id of error events
    pub correlation_id: Option<Uuid>,
    /// Type name of the attached failure
    pub failure_type: Option<Arc<str>>,
    /// Message of the attached failure
    pub failure_message: Option<Arc<str>>,
    /// Approximate size in bytes
    pub size_bytes: usize,
}

/// Fixed-size ring buffer with exact allocation (no growth).
struct RingBuffer {
    entries: Box<[Option<LogEntry>]>,
    /// Write position
    tail: usize,
    /// Read position
    head: usize,
    len: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: std::iter::repeat_with(|| None)
                .take(capacity)
                .collect::<Box<[Option<LogEntry>]>>(),
            tail: 0,
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, entry: LogEntry) -> Option<LogEntry> {
        let evicted = self.entries[self.tail].replace(entry);
        self.tail = (self.tail + 1) % self.entries.len();

        if self.len < self.entries.len() {
            self.len += 1;
        } else {
            self.head = (self.head + 1) % self.entries.len();
        }

        evicted
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        let head = self.head;
        let len = self.len;
        let cap = self.entries.len();

        (0..len).filter_map(move |i| self.entries[(head + i) % cap].as_ref())
    }

    fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = None;
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

/// `LogSink` that keeps the most recent events in memory.
///
/// Clones share the same buffer.
#[derive(Clone)]
pub struct RingBufferLogSink {
    buffer: Arc<RwLock<RingBuffer>>,
    max_entries: usize,
    max_entry_bytes: usize,
    eviction_count: Arc<AtomicU64>,
}

impl RingBufferLogSink {
    /// Create a sink holding at most `max_entries` entries of at most
    /// `max_entry_bytes` bytes each. A zero capacity is raised to one.
    pub fn new(max_entries: usize, max_entry_bytes: usize) -> Self {
        let bounded_entries = max_entries.max(1);
        Self {
            buffer: Arc::new(RwLock::new(RingBuffer::new(bounded_entries))),
            max_entries: bounded_entries,
            max_entry_bytes,
            eviction_count: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    fn read_buffer(&self) -> RwLockReadGuard<'_, RingBuffer> {
        match self.buffer.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[inline]
    fn write_buffer(&self) -> RwLockWriteGuard<'_, RingBuffer> {
        match self.buffer.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record(
        &self,
        severity: Severity,
        message: &str,
        correlation_id: Option<Uuid>,
        failure: Option<&Failure>,
    ) {
        let entry = self.create_entry(severity, message, correlation_id, failure);

        if self.write_buffer().push(entry).is_some() {
            self.eviction_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Build a bounded entry. Message gets up to 256 bytes, the failure type
    /// 128 and the failure message whatever is left (capped at 512).
    fn create_entry(
        &self,
        severity: Severity,
        message: &str,
        correlation_id: Option<Uuid>,
        failure: Option<&Failure>,
    ) -> LogEntry {
        let mut remaining = self.max_entry_bytes;
        let mut size = 0usize;

        let message = truncate_to_bytes(message, remaining.min(256));
        size += message.len();
        remaining = remaining.saturating_sub(message.len());

        let (failure_type, failure_message) = match failure {
            Some(failure) => {
                let failure_type = truncate_to_bytes(failure.failure_type().name(), remaining.min(128));
                size += failure_type.len();
                remaining = remaining.saturating_sub(failure_type.len());

                let failure_message = truncate_to_bytes(failure.message(), remaining.min(512));
                size += failure_message.len();

                (
                    Some(Arc::from(failure_type.as_ref())),
                    Some(Arc::from(failure_message.as_ref())),
                )
            }
            None => (None, None),
        };

        LogEntry {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
            severity,
            message: Arc::from(message.as_ref()),
            correlation_id,
            failure_type,
            failure_message,
            size_bytes: size,
        }
    }

    /// The N most recent entries, newest first.
    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        self.read_buffer().iter().rev().take(count).cloned().collect()
    }

    /// All entries, newest first.
    pub fn get_all(&self) -> Vec<LogEntry> {
        self.read_buffer().iter().rev().cloned().collect()
    }

    /// All entries, oldest first.
    pub fn get_chronological(&self) -> Vec<LogEntry> {
        self.read_buffer().iter().cloned().collect()
    }

    /// Entries matching a predicate, oldest first.
    pub fn get_filtered<F>(&self, predicate: F) -> Vec<LogEntry>
    where
        F: Fn(&LogEntry) -> bool,
    {
        self.read_buffer()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Number of entries currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.read_buffer().len()
    }

    /// True when nothing has been recorded (or everything was cleared).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of evictions since creation.
    #[inline]
    pub fn eviction_count(&self) -> u64 {
        self.eviction_count.load(Ordering::Relaxed)
    }

    /// Drop every entry. The eviction counter is kept.
    pub fn clear(&self) {
        self.write_buffer().clear();
    }

    /// Maximum number of entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

impl LogSink for RingBufferLogSink {
    fn info(&self, message: &str, failure: Option<&Failure>) {
        self.record(Severity::Info, message, None, failure);
    }

    fn error(&self, message: &str, correlation_id: Uuid, failure: Option<&Failure>) {
        self.record(Severity::Error, message, Some(correlation_id), failure);
    }
}

/// Truncate string to maximum byte length, respecting UTF-8 boundaries.
fn truncate_to_bytes(s: &str, max_bytes: usize) -> Cow<'_, str> {
    if max_bytes == 0 {
        return Cow::Borrowed("");
    }
    if s.len() <= max_bytes {
        return Cow::Borrowed(s);
    }

    let indicator = "...[TRUNC]";
    if max_bytes <= indicator.len() {
        return Cow::Borrowed(&indicator[..max_bytes]);
    }
    let max_content = max_bytes - indicator.len();

    let mut idx = max_content;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }

    if idx == 0 {
        return Cow::Borrowed(indicator);
    }

    let mut out = String::with_capacity(idx + indicator.len());
    out.push_str(&s[..idx]);
    out.push_str(indicator);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest() {
        let sink = RingBufferLogSink::new(3, 1024);

        for i in 0..5 {
            sink.info(&format!("event {}", i), None);
        }

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.eviction_count(), 2);

        let entries = sink.get_all();
        assert_eq!(entries[0].message.as_ref(), "event 4");
        assert_eq!(entries[2].message.as_ref(), "event 2");
    }

    #[test]
    fn records_severity_correlation_and_failure() {
        let sink = RingBufferLogSink::new(10, 1024);
        let id = Uuid::new_v4();
        let failure = Failure::generic("disk on fire");

        sink.info("client", None);
        sink.error("server", id, Some(&failure));

        let entries = sink.get_chronological();
        assert_eq!(entries[0].severity, Severity::Info);
        assert!(entries[0].correlation_id.is_none());
        assert!(entries[0].failure_type.is_none());

        assert_eq!(entries[1].severity, Severity::Error);
        assert_eq!(entries[1].correlation_id, Some(id));
        assert_eq!(entries[1].failure_type.as_deref(), Some("Failure"));
        assert_eq!(entries[1].failure_message.as_deref(), Some("disk on fire"));
    }

    #[test]
    fn respects_size_limit() {
        let sink = RingBufferLogSink::new(100, 128);
        let failure = Failure::generic("A".repeat(10_000));

        sink.info("msg", Some(&failure));

        let entry = &sink.get_recent(1)[0];
        assert!(entry.size_bytes <= 128);
        assert!(entry.failure_message.as_deref().is_some_and(|m| m.contains("TRUNC")));
    }

    #[test]
    fn filtering_by_severity() {
        let sink = RingBufferLogSink::new(100, 1024);
        for i in 0..10 {
            if i % 2 == 0 {
                sink.info("i", None);
            } else {
                sink.error("e", Uuid::new_v4(), None);
            }
        }

        assert_eq!(sink.get_filtered(|e| e.severity == Severity::Error).len(), 5);
    }

    #[test]
    fn clone_shares_state() {
        let first = RingBufferLogSink::new(100, 1024);
        let second = first.clone();

        first.info("x", None);

        assert_eq!(second.len(), 1);
        second.clear();
        assert!(first.is_empty());
    }

    #[test]
    fn zero_capacity_is_raised() {
        let sink = RingBufferLogSink::new(0, 64);
        assert_eq!(sink.capacity(), 1);
        sink.info("a", None);
        sink.info("b", None);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn truncate_respects_utf8() {
        let emoji = "🔥".repeat(100);
        let truncated = truncate_to_bytes(&emoji, 50);

        assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
        assert!(truncated.len() <= 50);
    }

    #[test]
    fn concurrent_logging() {
        use std::thread;

        let sink = RingBufferLogSink::new(128, 256);
        let mut handles = Vec::new();

        for i in 0..8 {
            let sink = sink.clone();
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    sink.error(&format!("t{}-{}", i, j), Uuid::new_v4(), None);
                }
            }));
        }

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert_eq!(sink.len(), 128);
        assert_eq!(sink.eviction_count(), 800 - 128);
    }
}
