use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::common::types::Rid;
use crate::transaction::concurrency::transaction::{
    IsolationLevel, Transaction, TransactionState,
};

/// Lock modes on a tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

struct LockRequest {
    txn: Arc<Transaction>,
    mode: LockMode,
    granted: bool,
}

/// Per-RID queue of lock requests. The condition variable always waits on
/// the lock manager's global latch; `upgrading` admits at most one upgrade
/// in flight per tuple.
struct LockRequestQueue {
    requests: VecDeque<LockRequest>,
    upgrading: bool,
    cv: Arc<Condvar>,
}

impl Default for LockRequestQueue {
    fn default() -> Self {
        Self {
            requests: VecDeque::new(),
            upgrading: false,
            cv: Arc::new(Condvar::new()),
        }
    }
}

/// Tuple-granularity shared/exclusive lock table enforcing strict two-phase
/// locking with wound-wait deadlock prevention.
///
/// Transaction age is total-ordered by ID, lower meaning older. On conflict
/// an older requester wounds (aborts) younger holders; a younger shared
/// requester waits for older exclusive holders; a younger exclusive
/// requester dies against any older holder. No wait cycle can form, so no
/// lock-induced deadlock exists.
pub struct LockManager {
    latch: Mutex<HashMap<Rid, LockRequestQueue>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            latch: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire a shared lock on the RID. Returns false iff the transaction
    /// is, or becomes, aborted.
    pub fn lock_shared(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        let mut table = self.latch.lock();

        // Re-checked from the top after every wakeup
        loop {
            if txn.state() == TransactionState::Aborted {
                return false;
            }
            if txn.isolation_level() == IsolationLevel::ReadUncommitted {
                txn.set_state(TransactionState::Aborted);
                return false;
            }
            if txn.state() == TransactionState::Shrinking {
                txn.set_state(TransactionState::Aborted);
                return false;
            }
            if txn.is_shared_locked(&rid) {
                return true;
            }

            let queue = table.entry(rid).or_default();

            let mut wounded = false;
            let mut blocked_by_older = false;
            let mut i = 0;
            while i < queue.requests.len() {
                let other = queue.requests[i].txn.clone();
                if other.id() > txn.id() && other.is_exclusive_locked(&rid) {
                    // Older requester: wound the younger exclusive holder
                    wound(queue, i, &rid);
                    wounded = true;
                } else if other.id() < txn.id() && other.is_exclusive_locked(&rid) {
                    // Younger requester: wait behind the older exclusive holder
                    blocked_by_older = true;
                    break;
                } else {
                    i += 1;
                }
            }
            if wounded {
                queue.cv.notify_all();
            }

            if blocked_by_older {
                insert_txn_into_queue(queue, txn, LockMode::Shared);
                txn.add_shared(rid);
                let cv = queue.cv.clone();
                cv.wait(&mut table);
                continue;
            }

            txn.set_state(TransactionState::Growing);
            insert_txn_into_queue(queue, txn, LockMode::Shared);
            txn.add_shared(rid);
            return true;
        }
    }

    /// Acquire an exclusive lock on the RID. Never waits: younger conflicting
    /// holders are wounded, and an older holder makes the requester die.
    pub fn lock_exclusive(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        let mut table = self.latch.lock();

        if txn.state() == TransactionState::Aborted {
            return false;
        }
        if txn.state() == TransactionState::Shrinking {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        if txn.is_exclusive_locked(&rid) {
            return true;
        }

        let queue = table.entry(rid).or_default();

        let mut wounded = false;
        let mut i = 0;
        while i < queue.requests.len() {
            let other_id = queue.requests[i].txn.id();
            if other_id > txn.id() {
                wound(queue, i, &rid);
                wounded = true;
            } else if other_id < txn.id() {
                // Die: an older transaction is in the way
                if wounded {
                    queue.cv.notify_all();
                }
                txn.remove_shared(&rid);
                txn.remove_exclusive(&rid);
                txn.set_state(TransactionState::Aborted);
                return false;
            } else {
                i += 1;
            }
        }
        if wounded {
            queue.cv.notify_all();
        }

        txn.set_state(TransactionState::Growing);
        insert_txn_into_queue(queue, txn, LockMode::Exclusive);
        txn.add_exclusive(rid);
        true
    }

    /// Upgrade a held shared lock to exclusive. Only one upgrade may be in
    /// flight per RID; a second concurrent upgrade fails fast.
    pub fn lock_upgrade(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        let mut table = self.latch.lock();
        let mut holds_upgrade_flag = false;

        loop {
            if txn.state() == TransactionState::Aborted {
                if holds_upgrade_flag {
                    if let Some(queue) = table.get_mut(&rid) {
                        queue.upgrading = false;
                    }
                }
                return false;
            }
            if txn.state() == TransactionState::Shrinking {
                txn.set_state(TransactionState::Aborted);
                if holds_upgrade_flag {
                    if let Some(queue) = table.get_mut(&rid) {
                        queue.upgrading = false;
                    }
                }
                return false;
            }

            let queue = table.entry(rid).or_default();

            if !holds_upgrade_flag {
                if queue.upgrading {
                    txn.set_state(TransactionState::Aborted);
                    return false;
                }
                queue.upgrading = true;
                holds_upgrade_flag = true;
            }

            let mut wounded = false;
            let mut blocked_by_older = false;
            let mut i = 0;
            while i < queue.requests.len() {
                let other_id = queue.requests[i].txn.id();
                if other_id > txn.id() {
                    wound(queue, i, &rid);
                    wounded = true;
                } else if other_id < txn.id() {
                    blocked_by_older = true;
                    break;
                } else {
                    i += 1;
                }
            }
            if wounded {
                queue.cv.notify_all();
            }

            if blocked_by_older {
                let cv = queue.cv.clone();
                cv.wait(&mut table);
                continue;
            }

            // Only the caller's own shared request remains; promote it
            assert_eq!(queue.requests.len(), 1, "upgrade queue must reduce to the upgrading request");
            for request in queue.requests.iter_mut() {
                debug_assert_eq!(request.txn.id(), txn.id());
                request.mode = LockMode::Exclusive;
                request.granted = true;
            }
            queue.upgrading = false;

            txn.set_state(TransactionState::Growing);
            txn.add_exclusive(rid);
            txn.remove_shared(&rid);
            return true;
        }
    }

    /// Release the caller's lock on the RID, applying the two-phase state
    /// transition. Returns false if no lock was held.
    pub fn unlock(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        let mut table = self.latch.lock();
        let queue = match table.get_mut(&rid) {
            Some(queue) => queue,
            None => return false,
        };

        let mode = if txn.is_shared_locked(&rid) {
            LockMode::Shared
        } else {
            LockMode::Exclusive
        };

        // Exclusive release always ends the growing phase; shared release
        // only under REPEATABLE_READ, so READ_COMMITTED can drop shared
        // locks early without losing the ability to acquire more.
        if txn.state() == TransactionState::Growing {
            if txn.is_exclusive_locked(&rid) {
                txn.set_state(TransactionState::Shrinking);
            } else if txn.is_shared_locked(&rid)
                && txn.isolation_level() == IsolationLevel::RepeatableRead
            {
                txn.set_state(TransactionState::Shrinking);
            }
        }

        let mut i = 0;
        while i < queue.requests.len() {
            if queue.requests[i].txn.id() == txn.id() {
                debug_assert_eq!(queue.requests[i].mode, mode);
                queue.requests.remove(i);
                match mode {
                    LockMode::Shared => {
                        txn.remove_shared(&rid);
                        if !queue.requests.is_empty() {
                            queue.cv.notify_all();
                        }
                    }
                    LockMode::Exclusive => {
                        txn.remove_exclusive(&rid);
                        queue.cv.notify_all();
                    }
                }
                return true;
            }
            i += 1;
        }
        false
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Abort the transaction behind the request at `idx`, erase the request, and
/// clear the victim's lock sets for the RID. The caller signals the queue's
/// condition variable afterwards so a wounded waiter observes the abort.
fn wound(queue: &mut LockRequestQueue, idx: usize, rid: &Rid) {
    if let Some(request) = queue.requests.remove(idx) {
        debug!(
            "wounding txn {} ({:?} request, granted: {})",
            request.txn.id(),
            request.mode,
            request.granted
        );
        request.txn.remove_shared(rid);
        request.txn.remove_exclusive(rid);
        request.txn.set_state(TransactionState::Aborted);
    }
}

/// Upsert the transaction's request into the queue. An existing entry only
/// has its granted flag refreshed.
fn insert_txn_into_queue(queue: &mut LockRequestQueue, txn: &Arc<Transaction>, mode: LockMode) {
    for request in queue.requests.iter_mut() {
        if request.txn.id() == txn.id() {
            request.granted = mode == LockMode::Exclusive;
            return;
        }
    }
    queue.requests.push_back(LockRequest {
        txn: txn.clone(),
        mode,
        granted: false,
    });
}
