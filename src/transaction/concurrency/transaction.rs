// Represents an active database transaction.
//
// The lock manager mutates transactions other than the caller's (wound-wait
// aborts), always under its own global latch, so every mutable field sits
// behind its own lock.

use std::collections::HashSet;
use parking_lot::Mutex;

use crate::common::types::{Rid, TxnId};

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

/// Transaction states under strict two-phase locking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// Kind of index modification recorded for rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    Insert,
    Delete,
    Update,
}

/// One entry of the index write log. Images are the executor's serialized
/// tuples; this layer does not interpret them.
#[derive(Debug, Clone)]
pub struct IndexWriteRecord {
    pub rid: Rid,
    pub op: WriteType,
    pub before_image: Option<Vec<u8>>,
    pub after_image: Option<Vec<u8>>,
}

/// Transaction - tracks lock ownership and pending index writes
pub struct Transaction {
    /// Transaction ID; lower IDs are older
    id: TxnId,

    /// Isolation level for this transaction
    isolation_level: IsolationLevel,

    /// Current transaction state
    state: Mutex<TransactionState>,

    /// RIDs this transaction holds shared locks on
    shared_lock_set: Mutex<HashSet<Rid>>,

    /// RIDs this transaction holds exclusive locks on
    exclusive_lock_set: Mutex<HashSet<Rid>>,

    /// Append-only log of index modifications, for executor rollback
    index_write_set: Mutex<Vec<IndexWriteRecord>>,
}

impl Transaction {
    /// Create a new transaction in the growing phase
    pub fn new(id: TxnId, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            shared_lock_set: Mutex::new(HashSet::new()),
            exclusive_lock_set: Mutex::new(HashSet::new()),
            index_write_set: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    pub fn is_shared_locked(&self, rid: &Rid) -> bool {
        self.shared_lock_set.lock().contains(rid)
    }

    pub fn is_exclusive_locked(&self, rid: &Rid) -> bool {
        self.exclusive_lock_set.lock().contains(rid)
    }

    pub fn add_shared(&self, rid: Rid) {
        self.shared_lock_set.lock().insert(rid);
    }

    pub fn remove_shared(&self, rid: &Rid) {
        self.shared_lock_set.lock().remove(rid);
    }

    pub fn add_exclusive(&self, rid: Rid) {
        self.exclusive_lock_set.lock().insert(rid);
    }

    pub fn remove_exclusive(&self, rid: &Rid) {
        self.exclusive_lock_set.lock().remove(rid);
    }

    /// Snapshot of the RIDs currently shared-locked
    pub fn shared_rids(&self) -> Vec<Rid> {
        self.shared_lock_set.lock().iter().copied().collect()
    }

    /// Snapshot of the RIDs currently exclusive-locked
    pub fn exclusive_rids(&self) -> Vec<Rid> {
        self.exclusive_lock_set.lock().iter().copied().collect()
    }

    /// Record an index modification for potential rollback
    pub fn append_index_write(&self, record: IndexWriteRecord) {
        self.index_write_set.lock().push(record);
    }

    /// Snapshot of the index write log
    pub fn index_writes(&self) -> Vec<IndexWriteRecord> {
        self.index_write_set.lock().clone()
    }
}
