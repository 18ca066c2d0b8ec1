//! In-memory buffer of records awaiting flush.

use crate::core::record::EventRecord;

/// Ordered, append-only buffer with a soft capacity.
#[derive(Debug)]
pub struct EventBuffer {
    records: Vec<EventRecord>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record. Returns true when the buffer has reached capacity.
    pub fn push(&mut self, record: EventRecord) -> bool {
        self.records.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Take every buffered record, leaving an empty buffer behind.
    pub fn take(&mut self) -> Vec<EventRecord> {
        std::mem::replace(&mut self.records, Vec::with_capacity(self.capacity))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
