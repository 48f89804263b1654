use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;

use crate::cache::MockDatumStore;
use crate::engine::MockPushDispatcher;
use crate::engine::MockSubscriberDirectory;
use crate::registry::MockMetadataSource;
use crate::AppRevision;
use crate::AssembleMode;
use crate::ChangeFanoutEngine;
use crate::DataInfo;
use crate::DataKind;
use crate::Datum;
use crate::DatumCache;
use crate::EngineConfig;
use crate::PushBatch;
use crate::RevisionInterface;
use crate::RevisionRegistry;
use crate::Scope;
use crate::SequencerConfig;
use crate::Subscriber;

fn addr() -> SocketAddr {
    "127.0.0.1:18080".parse().expect("address should parse")
}

fn interface_info() -> DataInfo {
    DataInfo::interface("com.example.EchoService", "default-instance", "rpc")
}

fn app_info() -> DataInfo {
    DataInfo::aggregated_app("appA", "default-instance")
}

fn revision_r1() -> AppRevision {
    let mut rev = AppRevision::new("r1", "appA");
    rev.interfaces.insert(
        "com.example.EchoService".to_string(),
        RevisionInterface {
            data_id: "com.example.EchoService".to_string(),
            instance_id: "default-instance".to_string(),
            group: "rpc".to_string(),
        },
    );
    rev
}

fn subscriber(
    register_id: &str,
    data_info: DataInfo,
    assemble_mode: AssembleMode,
) -> Arc<Subscriber> {
    Arc::new(Subscriber::new(register_id, data_info, addr(), assemble_mode, Scope::Zone))
}

/// Engine wired to a capturing dispatcher; delivered batches land in the
/// returned sink.
fn build_engine(
    store: MockDatumStore,
    directory: MockSubscriberDirectory,
    revisions: Arc<RevisionRegistry>,
) -> (ChangeFanoutEngine, Arc<Mutex<Vec<PushBatch>>>) {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let mut dispatcher = MockPushDispatcher::new();
    dispatcher.expect_deliver().returning(move |batch| {
        sink.lock().push(batch);
        Ok(())
    });

    let engine = ChangeFanoutEngine::new(
        EngineConfig::default(),
        &SequencerConfig {
            lanes: 2,
            lane_buffer_size: 64,
        },
        Arc::new(DatumCache::new(Arc::new(store))),
        revisions,
        Arc::new(directory),
        Arc::new(dispatcher),
    );
    (engine, batches)
}

fn empty_registry() -> Arc<RevisionRegistry> {
    Arc::new(RevisionRegistry::new(Arc::new(MockMetadataSource::new())))
}

#[tokio::test]
async fn interface_change_pushes_only_subscribers_behind_the_new_version() {
    let info = interface_info();
    let interface_id = info.data_info_id();

    let datum = Datum::new(info.clone(), "dc1", 6);
    let mut store = MockDatumStore::new();
    store.expect_load_snapshot().returning(move |_, _| Ok(Some(datum.clone())));

    // s1 is one version behind, s2 already holds v6
    let s1 = subscriber("reg-1", info.clone(), AssembleMode::InterfaceOnly);
    s1.mark_pushed("dc1", 5);
    let s2 = subscriber("reg-2", info.clone(), AssembleMode::InterfaceOnly);
    s2.mark_pushed("dc1", 6);

    let mut directory = MockSubscriberDirectory::new();
    let (w1, w2) = (Arc::clone(&s1), Arc::clone(&s2));
    directory
        .expect_watchers_of()
        .returning(move |_| vec![Arc::clone(&w1), Arc::clone(&w2)]);

    let (engine, batches) = build_engine(store, directory, empty_registry());

    assert!(engine.fire_on_change("dc1", &info, 6));
    sleep(Duration::from_millis(50)).await;

    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert!(batch.subscribers.contains_key("reg-1"));
    assert!(!batch.subscribers.contains_key("reg-2"));
    assert_eq!(batch.datum_map[&interface_id].version, 6);
    assert!(batch.seq_start < batch.seq_end);
    assert!(!batch.no_delay);
}

#[tokio::test]
async fn app_change_never_reaches_interface_only_watchers() {
    let app = app_info();
    let interface_id = revision_r1().interfaces["com.example.EchoService"].data_info_id();

    let mut app_datum = Datum::new(app.clone(), "dc1", 7);
    app_datum.revisions.insert("r1".to_string());
    let mut store = MockDatumStore::new();
    store.expect_load_snapshot().returning(move |data_info, _| {
        if data_info.kind == DataKind::AggregatedApp {
            Ok(Some(app_datum.clone()))
        } else {
            Ok(None)
        }
    });

    // the app datum's revision set drives one metadata resync
    let mut meta = MockMetadataSource::new();
    meta.expect_check_revisions()
        .times(1)
        .returning(|_| Ok(vec!["r1".to_string()]));
    meta.expect_fetch_revisions()
        .times(1)
        .returning(|_| Ok(vec![revision_r1()]));
    let revisions = Arc::new(RevisionRegistry::new(Arc::new(meta)));

    let w_interface_only = subscriber("reg-int", interface_info(), AssembleMode::InterfaceOnly);
    let w_app_only = subscriber("reg-app", interface_info(), AssembleMode::AppOnly);

    let mut directory = MockSubscriberDirectory::new();
    let (wi, wa) = (Arc::clone(&w_interface_only), Arc::clone(&w_app_only));
    let expected_id = interface_id.clone();
    directory.expect_watchers_of().returning(move |id| {
        assert_eq!(id, expected_id);
        vec![Arc::clone(&wi), Arc::clone(&wa)]
    });

    let (engine, batches) = build_engine(store, directory, revisions);

    assert!(engine.fire_on_change("dc1", &app, 7));
    sleep(Duration::from_millis(50)).await;

    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    // only the app-only watcher is reached, with just the app snapshot
    assert!(batch.subscribers.contains_key("reg-app"));
    assert!(!batch.subscribers.contains_key("reg-int"));
    assert_eq!(batch.datum_map.len(), 1);
    assert_eq!(batch.datum_map[&app.data_info_id()].version, 7);
}

#[tokio::test]
async fn interface_change_skips_app_only_and_assembles_for_app_and_interface() {
    let info = interface_info();
    let interface_id = info.data_info_id();
    let app = app_info();

    let interface_datum = Datum::new(info.clone(), "dc1", 6);
    let app_datum = Datum::new(app.clone(), "dc1", 9);
    let mut store = MockDatumStore::new();
    store.expect_load_snapshot().returning(move |data_info, _| {
        if data_info.kind == DataKind::AggregatedApp {
            Ok(Some(app_datum.clone()))
        } else {
            Ok(Some(interface_datum.clone()))
        }
    });

    let mut meta = MockMetadataSource::new();
    meta.expect_check_revisions().returning(|_| Ok(vec!["r1".to_string()]));
    meta.expect_fetch_revisions().returning(|_| Ok(vec![revision_r1()]));
    let revisions = Arc::new(RevisionRegistry::new(Arc::new(meta)));
    revisions.refresh_all().await.expect("seeding refresh should succeed");

    let w_app_only = subscriber("reg-app", info.clone(), AssembleMode::AppOnly);
    let w_both = subscriber("reg-both", info.clone(), AssembleMode::AppAndInterface);

    let mut directory = MockSubscriberDirectory::new();
    let (wa, wb) = (Arc::clone(&w_app_only), Arc::clone(&w_both));
    directory
        .expect_watchers_of()
        .returning(move |_| vec![Arc::clone(&wa), Arc::clone(&wb)]);

    let (engine, batches) = build_engine(store, directory, revisions);

    assert!(engine.fire_on_change("dc1", &info, 6));
    sleep(Duration::from_millis(50)).await;

    let batches = batches.lock();
    // app-only watchers do not care about interface changes
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert!(batch.subscribers.contains_key("reg-both"));
    assert!(!batch.subscribers.contains_key("reg-app"));
    // combined snapshot holds the interface and the implementing app
    let ids: HashSet<&String> = batch.datum_map.keys().collect();
    assert!(ids.contains(&interface_id));
    assert!(ids.contains(&app.data_info_id()));
}

#[tokio::test]
async fn datum_arrival_rejects_aggregated_app_kind() {
    let store = MockDatumStore::new();
    let directory = MockSubscriberDirectory::new();
    let (engine, batches) = build_engine(store, directory, empty_registry());

    let datum = Datum::new(app_info(), "dc1", 3);
    assert!(!engine.fire_on_datum(datum).await);
    assert!(batches.lock().is_empty());
}

#[tokio::test]
async fn datum_arrival_pushes_with_two_fresh_ordering_tokens() {
    let info = interface_info();
    let store = MockDatumStore::new();

    let s1 = subscriber("reg-1", info.clone(), AssembleMode::InterfaceOnly);
    let mut directory = MockSubscriberDirectory::new();
    let w1 = Arc::clone(&s1);
    directory.expect_watchers_of().returning(move |_| vec![Arc::clone(&w1)]);

    let (engine, batches) = build_engine(store, directory, empty_registry());

    let datum = Datum::new(info.clone(), "dc1", 6);
    assert!(engine.fire_on_datum(datum).await);

    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    // the datum's own version identifies the batch
    assert_eq!(batch.push_version, 6);
    assert_eq!(batch.seq_end, batch.seq_start + 1);
    assert!(batch.no_delay);
}

#[tokio::test]
async fn empty_push_is_never_considered_stale() {
    let store = MockDatumStore::new();
    let directory = MockSubscriberDirectory::new();
    let (engine, batches) = build_engine(store, directory, empty_registry());

    // even a watcher far ahead must receive the empty push
    let s1 = subscriber("reg-1", interface_info(), AssembleMode::InterfaceOnly);
    s1.mark_pushed("DefaultDataCenter", 999);

    assert!(engine.fire_on_push_empty(Arc::clone(&s1)).await);

    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert!(batch.datum_map.is_empty());
    assert_eq!(batch.seq_start, u64::MAX);
    assert_eq!(batch.seq_end, u64::MAX);
    assert_eq!(batch.data_center, "DefaultDataCenter");
    assert!(batch.subscribers.contains_key("reg-1"));
}

#[tokio::test]
async fn new_watcher_receives_an_initial_interface_push() {
    let info = interface_info();
    let interface_id = info.data_info_id();

    // initial pushes resolve against the engine's own data center
    let datum = Datum::new(info.clone(), "DefaultDataCenter", 3);
    let mut store = MockDatumStore::new();
    store.expect_load_snapshot().returning(move |_, _| Ok(Some(datum.clone())));

    let directory = MockSubscriberDirectory::new();
    let (engine, batches) = build_engine(store, directory, empty_registry());

    let s1 = subscriber("reg-1", info.clone(), AssembleMode::InterfaceOnly);
    assert!(engine.fire_on_register(Arc::clone(&s1)));
    sleep(Duration::from_millis(50)).await;

    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert!(batch.no_delay);
    assert_eq!(batch.datum_map[&interface_id].version, 3);
    assert!(batch.subscribers.contains_key("reg-1"));
}

#[tokio::test]
async fn later_recomputations_carry_strictly_greater_brackets() {
    let info = interface_info();

    let datum = Datum::new(info.clone(), "dc1", 6);
    let mut store = MockDatumStore::new();
    store.expect_load_snapshot().returning(move |_, _| Ok(Some(datum.clone())));

    let s1 = subscriber("reg-1", info.clone(), AssembleMode::InterfaceOnly);
    let mut directory = MockSubscriberDirectory::new();
    let w1 = Arc::clone(&s1);
    directory.expect_watchers_of().returning(move |_| vec![Arc::clone(&w1)]);

    let (engine, batches) = build_engine(store, directory, empty_registry());

    assert!(engine.fire_on_change("dc1", &info, 0));
    assert!(engine.fire_on_change("dc1", &info, 0));
    sleep(Duration::from_millis(50)).await;

    let batches = batches.lock();
    assert_eq!(batches.len(), 2);
    // same key, same lane: the second computation supersedes the first
    assert!(batches[1].seq_start > batches[0].seq_end);
    assert!(batches[1].push_version > batches[0].push_version);
}
