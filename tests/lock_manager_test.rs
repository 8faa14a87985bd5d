use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bucketdb::common::types::Rid;
use bucketdb::transaction::{IsolationLevel, LockManager, Transaction, TransactionState};

fn txn(id: u32, isolation: IsolationLevel) -> Arc<Transaction> {
    Arc::new(Transaction::new(id, isolation))
}

#[test]
fn test_shared_locks_are_compatible() {
    let lm = LockManager::new();
    let rid = Rid::new(1, 1);
    let t1 = txn(1, IsolationLevel::RepeatableRead);
    let t2 = txn(2, IsolationLevel::RepeatableRead);

    assert!(lm.lock_shared(&t1, rid));
    assert!(lm.lock_shared(&t2, rid));
    assert!(t1.is_shared_locked(&rid));
    assert!(t2.is_shared_locked(&rid));

    // Re-acquiring a held shared lock is a no-op success
    assert!(lm.lock_shared(&t1, rid));

    assert!(lm.unlock(&t1, rid));
    assert!(lm.unlock(&t2, rid));
}

#[test]
fn test_exclusive_reacquire_is_noop() {
    let lm = LockManager::new();
    let rid = Rid::new(1, 2);
    let t1 = txn(1, IsolationLevel::RepeatableRead);

    assert!(lm.lock_exclusive(&t1, rid));
    assert!(lm.lock_exclusive(&t1, rid));
    assert!(t1.is_exclusive_locked(&rid));
}

#[test]
fn test_older_exclusive_requester_wounds_younger_holder() {
    let lm = LockManager::new();
    let rid = Rid::new(2, 1);
    let t_young = txn(10, IsolationLevel::RepeatableRead);
    let t_old = txn(5, IsolationLevel::RepeatableRead);

    assert!(lm.lock_exclusive(&t_young, rid));

    // The older transaction wounds the younger holder and takes the lock
    assert!(lm.lock_exclusive(&t_old, rid));
    assert_eq!(t_young.state(), TransactionState::Aborted);
    assert!(!t_young.is_exclusive_locked(&rid));
    assert!(t_old.is_exclusive_locked(&rid));
}

#[test]
fn test_older_shared_requester_wounds_younger_exclusive_holder() {
    let lm = LockManager::new();
    let rid = Rid::new(2, 2);
    let t_young = txn(10, IsolationLevel::RepeatableRead);
    let t_old = txn(5, IsolationLevel::RepeatableRead);

    assert!(lm.lock_exclusive(&t_young, rid));

    assert!(lm.lock_shared(&t_old, rid));
    assert_eq!(t_young.state(), TransactionState::Aborted);
    assert!(t_old.is_shared_locked(&rid));
}

#[test]
fn test_younger_exclusive_requester_dies_against_older_holder() {
    let lm = LockManager::new();
    let rid = Rid::new(2, 3);
    let t_old = txn(5, IsolationLevel::RepeatableRead);
    let t_young = txn(10, IsolationLevel::RepeatableRead);

    assert!(lm.lock_exclusive(&t_old, rid));

    assert!(!lm.lock_exclusive(&t_young, rid));
    assert_eq!(t_young.state(), TransactionState::Aborted);
    assert!(t_old.is_exclusive_locked(&rid));
}

#[test]
fn test_younger_shared_requester_waits_for_older_exclusive_holder() {
    let lm = Arc::new(LockManager::new());
    let rid = Rid::new(3, 1);
    let t_old = txn(1, IsolationLevel::RepeatableRead);
    let t_young = txn(2, IsolationLevel::RepeatableRead);

    assert!(lm.lock_exclusive(&t_old, rid));

    let waiter = {
        let lm = Arc::clone(&lm);
        let t_young = Arc::clone(&t_young);
        thread::spawn(move || lm.lock_shared(&t_young, rid))
    };

    // Let the younger transaction reach the wait
    thread::sleep(Duration::from_millis(100));

    assert!(lm.unlock(&t_old, rid));
    assert!(waiter.join().unwrap());
    assert!(t_young.is_shared_locked(&rid));
}

#[test]
fn test_read_uncommitted_cannot_take_shared_locks() {
    let lm = LockManager::new();
    let rid = Rid::new(4, 1);
    let t1 = txn(1, IsolationLevel::ReadUncommitted);

    assert!(!lm.lock_shared(&t1, rid));
    assert_eq!(t1.state(), TransactionState::Aborted);

    // Exclusive locks are still allowed under READ_UNCOMMITTED
    let t2 = txn(2, IsolationLevel::ReadUncommitted);
    assert!(lm.lock_exclusive(&t2, rid));
}

#[test]
fn test_shared_unlock_under_read_committed_keeps_growing() {
    let lm = LockManager::new();
    let r1 = Rid::new(5, 1);
    let r2 = Rid::new(5, 2);
    let t1 = txn(1, IsolationLevel::ReadCommitted);

    assert!(lm.lock_shared(&t1, r1));
    assert!(lm.unlock(&t1, r1));
    assert_eq!(t1.state(), TransactionState::Growing);

    // Early shared release did not end the growing phase
    assert!(lm.lock_shared(&t1, r2));
}

#[test]
fn test_shared_unlock_under_repeatable_read_starts_shrinking() {
    let lm = LockManager::new();
    let r1 = Rid::new(5, 3);
    let r2 = Rid::new(5, 4);
    let t1 = txn(1, IsolationLevel::RepeatableRead);

    assert!(lm.lock_shared(&t1, r1));
    assert!(lm.unlock(&t1, r1));
    assert_eq!(t1.state(), TransactionState::Shrinking);

    // No lock may be acquired in the shrinking phase
    assert!(!lm.lock_shared(&t1, r2));
    assert_eq!(t1.state(), TransactionState::Aborted);
}

#[test]
fn test_exclusive_unlock_always_starts_shrinking() {
    let lm = LockManager::new();
    let r1 = Rid::new(5, 5);
    let r2 = Rid::new(5, 6);
    let t1 = txn(1, IsolationLevel::ReadCommitted);

    assert!(lm.lock_exclusive(&t1, r1));
    assert!(lm.unlock(&t1, r1));
    assert_eq!(t1.state(), TransactionState::Shrinking);

    assert!(!lm.lock_exclusive(&t1, r2));
    assert_eq!(t1.state(), TransactionState::Aborted);
}

#[test]
fn test_unlock_without_lock_fails() {
    let lm = LockManager::new();
    let rid = Rid::new(6, 1);
    let t1 = txn(1, IsolationLevel::RepeatableRead);
    assert!(!lm.unlock(&t1, rid));
}

#[test]
fn test_upgrade_wounds_younger_shared_holder() {
    let lm = LockManager::new();
    let rid = Rid::new(7, 1);
    let t_old = txn(5, IsolationLevel::RepeatableRead);
    let t_young = txn(7, IsolationLevel::RepeatableRead);

    assert!(lm.lock_shared(&t_old, rid));
    assert!(lm.lock_shared(&t_young, rid));

    // The older holder upgrades by wounding the younger shared holder
    assert!(lm.lock_upgrade(&t_old, rid));
    assert!(t_old.is_exclusive_locked(&rid));
    assert!(!t_old.is_shared_locked(&rid));
    assert_eq!(t_young.state(), TransactionState::Aborted);
    assert!(!t_young.is_shared_locked(&rid));
}

#[test]
fn test_concurrent_upgrade_fails_fast() {
    let lm = Arc::new(LockManager::new());
    let rid = Rid::new(7, 2);
    let t3 = txn(3, IsolationLevel::RepeatableRead);
    let t7 = txn(7, IsolationLevel::RepeatableRead);

    assert!(lm.lock_shared(&t3, rid));
    assert!(lm.lock_shared(&t7, rid));

    // t7's upgrade must wait behind the older shared holder t3
    let upgrader = {
        let lm = Arc::clone(&lm);
        let t7 = Arc::clone(&t7);
        thread::spawn(move || lm.lock_upgrade(&t7, rid))
    };
    thread::sleep(Duration::from_millis(100));

    // A second upgrade on the same RID fails fast on the upgrading flag
    let t9 = txn(9, IsolationLevel::RepeatableRead);
    assert!(lm.lock_shared(&t9, rid));
    assert!(!lm.lock_upgrade(&t9, rid));
    assert_eq!(t9.state(), TransactionState::Aborted);

    // Once t3 releases, t7's upgrade wounds the aborted t9 and completes
    assert!(lm.unlock(&t3, rid));
    assert!(upgrader.join().unwrap());
    assert!(t7.is_exclusive_locked(&rid));
}

#[test]
fn test_no_lock_after_abort() {
    let lm = LockManager::new();
    let rid = Rid::new(8, 1);
    let t1 = txn(1, IsolationLevel::RepeatableRead);

    t1.set_state(TransactionState::Aborted);
    assert!(!lm.lock_shared(&t1, rid));
    assert!(!lm.lock_exclusive(&t1, rid));
    assert!(!lm.lock_upgrade(&t1, rid));
}
