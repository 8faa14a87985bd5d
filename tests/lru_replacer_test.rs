use bucketdb::LRUReplacer;

#[test]
fn test_lru_victim_sequence() {
    let replacer = LRUReplacer::new(7);

    for frame_id in 1..=6 {
        replacer.unpin(frame_id);
    }
    assert_eq!(replacer.size(), 6);

    // Frame 1 becomes most recently used again
    replacer.unpin(1);
    assert_eq!(replacer.size(), 6);

    // Frame 3 is back in use and no longer evictable
    replacer.pin(3);
    assert_eq!(replacer.size(), 5);

    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(4));
    assert_eq!(replacer.victim(), Some(5));
    assert_eq!(replacer.size(), 2);
}

#[test]
fn test_victim_on_empty_replacer() {
    let replacer = LRUReplacer::new(3);
    assert_eq!(replacer.victim(), None);

    replacer.unpin(0);
    assert_eq!(replacer.victim(), Some(0));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_frame_appears_at_most_once() {
    let replacer = LRUReplacer::new(5);
    replacer.unpin(1);
    replacer.unpin(1);
    replacer.unpin(1);
    assert_eq!(replacer.size(), 1);
    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_pin_untracked_frame_is_noop() {
    let replacer = LRUReplacer::new(5);
    replacer.unpin(1);
    replacer.pin(2);
    assert_eq!(replacer.size(), 1);
}

#[test]
fn test_size_never_exceeds_capacity() {
    let replacer = LRUReplacer::new(4);
    for frame_id in 0..10 {
        replacer.unpin(frame_id);
        assert!(replacer.size() <= 4);
    }
    // Victims come out in strict least-recently-unpinned order
    assert_eq!(replacer.victim(), Some(0));
    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(3));
    assert_eq!(replacer.victim(), None);
}
