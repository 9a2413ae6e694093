//! Datastore contract specs
//!
//! Every law is checked against the file-backed store and the in-memory
//! fake, so collaborators testing against the fake see the same behaviour.

use crate::prelude::*;

/// Run `law` against a fresh file-backed store and a fresh fake
fn for_each_store(entries: u32, entry_size: u32, law: impl Fn(&dyn Datastore)) {
    let file = StoreFile::new();
    let store = FileDatastore::with_id_gen(
        &file.config(entries, entry_size),
        SequentialIdGen::new(-5),
    )
    .unwrap();
    law(&store);

    law(&FakeDatastore::new(entries, entry_size));
}

#[test]
fn saved_payload_is_returned_by_stored_events() {
    for_each_store(10, 64, |store| {
        let payloads: [&[u8]; 3] = [b"", b"abc", &[0xFF; 64]];
        for payload in payloads {
            let id = store.save_event(payload).unwrap();
            assert_eq!(
                store.stored_events().unwrap().get(&id).map(Vec::as_slice),
                Some(payload)
            );
        }
    });
}

#[test]
fn deleting_unknown_id_is_silent() {
    for_each_store(10, 64, |store| {
        store.save_event(b"pending").unwrap();
        let before = store.stored_events().unwrap();

        store.delete_event(i64::MIN).unwrap();
        store.delete_event(12_345).unwrap();

        similar_asserts::assert_eq!(store.stored_events().unwrap(), before);
    });
}

#[test]
fn deleting_twice_equals_deleting_once() {
    for_each_store(10, 64, |store| {
        let a = store.save_event(b"a").unwrap();
        let b = store.save_event(b"b").unwrap();

        store.delete_event(a).unwrap();
        let once = store.stored_events().unwrap();
        store.delete_event(a).unwrap();

        similar_asserts::assert_eq!(store.stored_events().unwrap(), once);
        similar_asserts::assert_eq!(once, HashMap::from([(b, b"b".to_vec())]));
    });
}

#[test]
fn full_store_rejects_until_an_event_is_deleted() {
    for_each_store(10, 64, |store| {
        let ids: Vec<EventId> = (0..10u8)
            .map(|i| store.save_event(&[i]).unwrap())
            .collect();

        assert!(matches!(
            store.save_event(b"one too many"),
            Err(DatastoreError::CapacityExceeded { capacity: 10 })
        ));

        store.delete_event(ids[0]).unwrap();
        assert!(store.save_event(b"fits again").is_ok());
    });
}

#[test]
fn oversized_payload_is_rejected_without_side_effects() {
    for_each_store(10, 64, |store| {
        store.save_event(b"existing").unwrap();

        assert!(matches!(
            store.save_event(&[0u8; 65]),
            Err(DatastoreError::PayloadTooLarge {
                len: 65,
                entry_size: 64
            })
        ));
        assert_eq!(store.stored_events().unwrap().len(), 1);
    });
}

#[test]
fn returned_snapshot_is_not_affected_by_later_writes() {
    for_each_store(10, 64, |store| {
        let id = store.save_event(b"before").unwrap();
        let snapshot = store.stored_events().unwrap();

        store.delete_event(id).unwrap();
        store.save_event(b"after").unwrap();

        similar_asserts::assert_eq!(snapshot, HashMap::from([(id, b"before".to_vec())]));
    });
}

#[test]
fn random_ids_do_not_collide_at_expected_volume() {
    let file = StoreFile::new();
    let store = file.open(1000, 16);

    for i in 0..1000u32 {
        store.save_event(&i.to_le_bytes()).unwrap();
    }
    assert_eq!(store.stored_events().unwrap().len(), 1000);
}

#[test]
fn regenerate_policy_never_overwrites() {
    let file = StoreFile::new();
    let config = file
        .config(10, 64)
        .with_collision(CollisionPolicy::Regenerate { max_attempts: 8 });
    let store = FileDatastore::with_id_gen(&config, SequentialIdGen::new(1)).unwrap();
    let other = FileDatastore::with_id_gen(&config, SequentialIdGen::new(1)).unwrap();

    // Both generators start at 1, so every first draw of `other` collides
    let first = store.save_event(b"store").unwrap();
    let second = other.save_event(b"other").unwrap();

    assert_ne!(first, second);
    similar_asserts::assert_eq!(
        store.stored_events().unwrap(),
        HashMap::from([(first, b"store".to_vec()), (second, b"other".to_vec())])
    );
}

#[test]
fn overwrite_policy_is_last_writer_wins() {
    let file = StoreFile::new();
    let config = file.config(10, 64);
    let store = FileDatastore::with_id_gen(&config, SequentialIdGen::new(1)).unwrap();
    let other = FileDatastore::with_id_gen(&config, SequentialIdGen::new(1)).unwrap();

    let first = store.save_event(b"store").unwrap();
    let second = other.save_event(b"other").unwrap();

    assert_eq!(first, second);
    similar_asserts::assert_eq!(
        store.stored_events().unwrap(),
        HashMap::from([(first, b"other".to_vec())])
    );
}
