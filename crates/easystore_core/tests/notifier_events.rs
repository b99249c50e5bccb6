use easystore_core::{
    MutationKind, NotificationBus, ObjectStore, Record, StoreConfig, StoreError,
    TransactionalNotifier,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Contact {
    id: u64,
    name: String,
}

impl Record for Contact {
    const KIND: &'static str = "contact";

    fn primary_key(&self) -> String {
        self.id.to_string()
    }
}

fn contact(id: u64, name: &str) -> Contact {
    Contact {
        id,
        name: name.to_string(),
    }
}

fn notifier() -> TransactionalNotifier<Contact> {
    let store = Arc::new(ObjectStore::open_in_memory().unwrap());
    TransactionalNotifier::new(store, Arc::new(NotificationBus::new()))
}

fn listen(notifier: &TransactionalNotifier<Contact>) -> Arc<Mutex<Vec<MutationKind>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    notifier.observe(move |kind| sink.lock().unwrap().push(kind));
    seen
}

fn take(seen: &Arc<Mutex<Vec<MutationKind>>>) -> Vec<MutationKind> {
    std::mem::take(&mut *seen.lock().unwrap())
}

#[test]
fn create_delete_and_reinsert_publish_in_order() {
    let notifier = notifier();
    let seen = listen(&notifier);
    let record_a = contact(1, "Ada");

    notifier.create(&record_a).unwrap();
    assert_eq!(take(&seen), vec![MutationKind::Add]);
    assert_eq!(notifier.get("1").unwrap(), Some(record_a.clone()));

    notifier.delete(&record_a).unwrap();
    assert_eq!(take(&seen), vec![MutationKind::Delete]);
    assert_eq!(notifier.get("1").unwrap(), None);

    notifier.insert(&record_a, false).unwrap();
    assert_eq!(take(&seen), vec![MutationKind::Add]);
    assert_eq!(notifier.count().unwrap(), 1);
}

#[test]
fn duplicate_insert_fails_without_second_notification() {
    let notifier = notifier();
    let seen = listen(&notifier);
    let record_b = contact(2, "Grace");

    notifier.insert(&record_b, false).unwrap();
    let err = notifier.insert(&record_b, false).unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert_eq!(take(&seen), vec![MutationKind::Add]);
}

#[test]
fn create_matches_insert_without_overwrite() {
    let notifier = notifier();
    let seen = listen(&notifier);

    notifier.create(&contact(3, "Linus")).unwrap();
    let via_create = notifier.create(&contact(3, "Linus again")).unwrap_err();
    let via_insert = notifier.insert(&contact(3, "Linus again"), false).unwrap_err();

    assert_eq!(via_create.code(), via_insert.code());
    assert_eq!(take(&seen), vec![MutationKind::Add]);
    assert_eq!(notifier.get("3").unwrap(), Some(contact(3, "Linus")));
}

#[test]
fn insert_with_overwrite_replaces_existing_and_publishes_add() {
    let notifier = notifier();
    let seen = listen(&notifier);

    notifier.create(&contact(4, "Barbara")).unwrap();
    notifier.insert(&contact(4, "Barbara L."), true).unwrap();
    notifier.upsert(&contact(5, "Ken")).unwrap();

    assert_eq!(
        take(&seen),
        vec![MutationKind::Add, MutationKind::Add, MutationKind::Add]
    );
    assert_eq!(notifier.get("4").unwrap(), Some(contact(4, "Barbara L.")));
    assert_eq!(notifier.count().unwrap(), 2);
}

#[test]
fn update_publishes_unless_silent() {
    let notifier = notifier();
    notifier.create(&contact(6, "Dennis")).unwrap();
    let seen = listen(&notifier);

    notifier
        .update(
            |session| session.modify::<Contact, _>("6", |c| c.name = "Dennis R.".to_string()),
            false,
        )
        .unwrap();
    assert_eq!(take(&seen), vec![MutationKind::Update]);

    notifier
        .update(
            |session| session.modify::<Contact, _>("6", |c| c.name = "D. Ritchie".to_string()),
            true,
        )
        .unwrap();
    assert!(take(&seen).is_empty());
    assert_eq!(notifier.get("6").unwrap(), Some(contact(6, "D. Ritchie")));
}

#[test]
fn failed_update_rolls_back_and_stays_quiet() {
    let notifier = notifier();
    notifier.create(&contact(7, "Margaret")).unwrap();
    let seen = listen(&notifier);

    let err = notifier
        .update(
            |session| {
                session.modify::<Contact, _>("7", |c| c.name = "changed".to_string())?;
                session.modify::<Contact, _>("missing", |c| c.name = "nobody".to_string())
            },
            false,
        )
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound { .. }));
    assert!(take(&seen).is_empty());
    assert_eq!(notifier.get("7").unwrap(), Some(contact(7, "Margaret")));
}

#[test]
fn deleting_missing_record_fails_without_notification() {
    let notifier = notifier();
    let seen = listen(&notifier);

    let err = notifier.delete(&contact(8, "ghost")).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert!(take(&seen).is_empty());
}

#[test]
fn write_and_notify_publishes_add_and_run_transaction_is_quiet() {
    let notifier = notifier();
    let seen = listen(&notifier);

    let written = notifier
        .write_and_notify(|session| {
            session.put(&contact(9, "Alan"), false)?;
            session.put(&contact(10, "Alonzo"), false)?;
            Ok(session.writes())
        })
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(take(&seen), vec![MutationKind::Add]);

    notifier
        .run_transaction(|session| session.remove_by_key::<Contact>("9"))
        .unwrap();
    assert!(take(&seen).is_empty());
    assert_eq!(notifier.all().unwrap(), vec![contact(10, "Alonzo")]);
}

#[test]
fn stop_observing_stops_delivery_and_tolerates_repeats() {
    let notifier = notifier();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let token = notifier.observe(move |kind| sink.lock().unwrap().push(kind));

    notifier.create(&contact(11, "Edsger")).unwrap();
    notifier.stop_observing(token);
    notifier.stop_observing(token);
    notifier.delete(&contact(11, "Edsger")).unwrap();

    assert_eq!(take(&seen), vec![MutationKind::Add]);
}

#[test]
fn every_registered_listener_receives_each_event_once() {
    let notifier = notifier();
    let first = listen(&notifier);
    let second = listen(&notifier);

    notifier.create(&contact(12, "Niklaus")).unwrap();

    assert_eq!(take(&first), vec![MutationKind::Add]);
    assert_eq!(take(&second), vec![MutationKind::Add]);
}

#[test]
fn listener_registered_after_publish_sees_nothing_retroactively() {
    let notifier = notifier();
    notifier.create(&contact(13, "Tony")).unwrap();

    let late = listen(&notifier);
    assert!(take(&late).is_empty());
}

#[test]
fn notifiers_on_separate_buses_are_isolated() {
    let store = Arc::new(ObjectStore::open_in_memory().unwrap());
    let left = TransactionalNotifier::<Contact>::new(
        Arc::clone(&store),
        Arc::new(NotificationBus::new()),
    );
    let right = TransactionalNotifier::<Contact>::new(store, Arc::new(NotificationBus::new()));
    let left_seen = listen(&left);
    let right_seen = listen(&right);

    left.create(&contact(14, "Frances")).unwrap();

    assert_eq!(take(&left_seen), vec![MutationKind::Add]);
    assert!(take(&right_seen).is_empty());
    assert_eq!(right.get("14").unwrap(), Some(contact(14, "Frances")));
}

#[test]
fn channel_follows_config_and_can_be_overridden() {
    let config = StoreConfig::in_memory().with_channel("contacts");
    let store = Arc::new(ObjectStore::open(&config).unwrap());
    let bus = Arc::new(NotificationBus::new());
    let default_channel =
        TransactionalNotifier::<Contact>::new(Arc::clone(&store), Arc::clone(&bus));
    let custom =
        TransactionalNotifier::<Contact>::new(store, Arc::clone(&bus)).with_channel("audit");
    assert_eq!(default_channel.channel(), "contacts");
    assert_eq!(custom.channel(), "audit");

    let seen = listen(&default_channel);
    custom.create(&contact(15, "Radia")).unwrap();
    assert!(take(&seen).is_empty());
    assert_eq!(bus.listener_count("contacts"), 1);
}

#[test]
fn listener_may_read_the_store_during_delivery() {
    let notifier = notifier();
    let observed_counts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed_counts);
    let reader = notifier.clone();
    notifier.observe(move |_| {
        let count = reader.count().unwrap();
        sink.lock().unwrap().push(count);
    });

    notifier.create(&contact(16, "Barbara")).unwrap();
    notifier.create(&contact(17, "Fran")).unwrap();

    assert_eq!(*observed_counts.lock().unwrap(), vec![1, 2]);
}

#[test]
fn panicking_listener_does_not_fail_the_operation() {
    let notifier = notifier();
    notifier.observe(|_| panic!("listener bug"));
    let seen = listen(&notifier);

    notifier.create(&contact(18, "Hedy")).unwrap();

    assert_eq!(take(&seen), vec![MutationKind::Add]);
    assert_eq!(notifier.count().unwrap(), 1);
}

#[test]
fn read_through_notifier_inside_update_fails_instead_of_hanging() {
    let notifier = notifier();
    notifier.create(&contact(19, "Ivan")).unwrap();
    let seen = listen(&notifier);
    let inner = notifier.clone();

    let err = notifier
        .update(
            |session| {
                session.modify::<Contact, _>("19", |c| c.name = "Ivan S.".to_string())?;
                inner.get("19").map(|_| ())
            },
            false,
        )
        .unwrap_err();

    assert!(matches!(err, StoreError::Reentrant));
    assert!(take(&seen).is_empty());
    assert_eq!(notifier.get("19").unwrap(), Some(contact(19, "Ivan")));
}

#[test]
fn nested_create_inside_write_is_rejected_and_outer_write_can_continue() {
    let notifier = notifier();
    let seen = listen(&notifier);
    let inner = notifier.clone();

    notifier
        .write_and_notify(|session| {
            let nested = inner.create(&contact(20, "Jean"));
            assert!(matches!(nested, Err(StoreError::Reentrant)));
            session.put(&contact(21, "John"), false)
        })
        .unwrap();

    assert_eq!(take(&seen), vec![MutationKind::Add]);
    assert_eq!(notifier.all().unwrap(), vec![contact(21, "John")]);
}

#[test]
fn creates_from_several_threads_each_publish_once() {
    let notifier = notifier();
    let seen = listen(&notifier);

    let handles: Vec<_> = (0..4_u64)
        .map(|worker| {
            let notifier = notifier.clone();
            std::thread::spawn(move || {
                for index in 0..10_u64 {
                    notifier
                        .create(&contact(100 + worker * 10 + index, "threaded"))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(take(&seen), vec![MutationKind::Add; 40]);
    assert_eq!(notifier.count().unwrap(), 40);
}
