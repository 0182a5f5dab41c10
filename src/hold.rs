use crate::aggregator::LogAggregator;
use crate::transaction::{Transaction, TransactionId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Returned by [`TransactionHold::append`] when the transaction has already
/// ended; the caller gets the line back to forward it directly.
#[derive(Debug, PartialEq, Eq)]
pub struct Ended(pub String);

/// Per-transaction lists of forwarded lines, held back until the
/// transaction ends.
///
/// A list is created by the first append for a transaction and removed by
/// its flush. Lines for a transaction that never ends stay here for the life
/// of the process.
#[derive(Default)]
pub struct TransactionHold {
    lists: Mutex<HashMap<TransactionId, Vec<String>>>,
}

impl TransactionHold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, transaction: &Transaction, event: String) -> Result<(), Ended> {
        let mut lists = self.lock();
        // Checked under the lock: `end` marks the transaction before the
        // flush takes this lock, so a line is never parked after its flush.
        if transaction.is_ended() {
            return Err(Ended(event));
        }
        lists.entry(transaction.id()).or_default().push(event);
        Ok(())
    }

    /// Move every line held for `id` into `aggregator`, oldest first.
    /// Returns how many lines were moved.
    pub fn flush(&self, id: TransactionId, aggregator: &LogAggregator) -> usize {
        let mut lists = self.lock();
        match lists.remove(&id) {
            Some(events) => {
                let flushed = events.len();
                aggregator.record_batch(events);
                flushed
            }
            None => 0,
        }
    }

    /// Lines currently held for `id`.
    pub fn pending(&self, id: TransactionId) -> usize {
        self.lock().get(&id).map_or(0, Vec::len)
    }

    /// Transactions with at least one held line.
    pub fn open_transactions(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TransactionId, Vec<String>>> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
