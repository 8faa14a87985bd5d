use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use parking_lot::Mutex;

use crate::common::types::TxnId;
use crate::transaction::concurrency::lock_manager::LockManager;
use crate::transaction::concurrency::transaction::{
    IsolationLevel, Transaction, TransactionState,
};

/// Transaction manager - creates and tracks transactions, and releases all
/// of a transaction's locks when it commits or aborts (the strict 2PL
/// release point).
pub struct TransactionManager {
    /// Next transaction ID to assign; assignment order is age order
    next_txn_id: AtomicU32,

    /// Lock manager used to release locks at commit/abort
    lock_manager: Arc<LockManager>,

    /// Active transactions map (txn_id -> Transaction)
    active_transactions: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
            lock_manager,
            active_transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a new transaction
    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id, isolation_level));
        self.active_transactions.lock().insert(txn_id, txn.clone());
        txn
    }

    /// Commit a transaction, releasing every lock it holds
    pub fn commit(&self, txn: &Arc<Transaction>) {
        txn.set_state(TransactionState::Committed);
        self.release_all_locks(txn);
        self.active_transactions.lock().remove(&txn.id());
    }

    /// Abort a transaction, releasing every lock it holds. Undoing the
    /// transaction's index writes from its write log is the executor's job.
    pub fn abort(&self, txn: &Arc<Transaction>) {
        txn.set_state(TransactionState::Aborted);
        self.release_all_locks(txn);
        self.active_transactions.lock().remove(&txn.id());
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.active_transactions.lock().get(&txn_id).cloned()
    }

    /// Get all active transaction IDs
    pub fn active_transaction_ids(&self) -> Vec<TxnId> {
        self.active_transactions.lock().keys().copied().collect()
    }

    fn release_all_locks(&self, txn: &Arc<Transaction>) {
        for rid in txn.shared_rids() {
            self.lock_manager.unlock(txn, rid);
        }
        for rid in txn.exclusive_rids() {
            self.lock_manager.unlock(txn, rid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Rid;

    fn test_manager() -> TransactionManager {
        TransactionManager::new(Arc::new(LockManager::new()))
    }

    #[test]
    fn test_begin_assigns_monotonic_ids() {
        let tm = test_manager();
        let t1 = tm.begin(IsolationLevel::ReadCommitted);
        let t2 = tm.begin(IsolationLevel::RepeatableRead);
        assert!(t1.id() < t2.id());
        assert_eq!(t1.state(), TransactionState::Growing);

        let ids = tm.active_transaction_ids();
        assert!(ids.contains(&t1.id()) && ids.contains(&t2.id()));
    }

    #[test]
    fn test_commit_removes_and_releases() {
        let lock_manager = Arc::new(LockManager::new());
        let tm = TransactionManager::new(lock_manager.clone());
        let rid = Rid::new(1, 1);

        let t1 = tm.begin(IsolationLevel::RepeatableRead);
        assert!(lock_manager.lock_exclusive(&t1, rid));

        tm.commit(&t1);
        assert_eq!(t1.state(), TransactionState::Committed);
        assert!(t1.exclusive_rids().is_empty());
        assert!(tm.get_transaction(t1.id()).is_none());

        // The lock is gone: a later transaction takes it without conflict
        let t2 = tm.begin(IsolationLevel::RepeatableRead);
        assert!(lock_manager.lock_exclusive(&t2, rid));
        assert_eq!(t2.state(), TransactionState::Growing);
    }

    #[test]
    fn test_abort_releases_locks() {
        let lock_manager = Arc::new(LockManager::new());
        let tm = TransactionManager::new(lock_manager.clone());
        let rid = Rid::new(2, 7);

        let t1 = tm.begin(IsolationLevel::RepeatableRead);
        assert!(lock_manager.lock_shared(&t1, rid));

        tm.abort(&t1);
        assert_eq!(t1.state(), TransactionState::Aborted);
        assert!(t1.shared_rids().is_empty());
        assert!(tm.get_transaction(t1.id()).is_none());
    }
}
