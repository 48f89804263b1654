use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::error;
use tracing::info;
use tracing::warn;

use crate::group_by_assemble_and_scope;
use crate::group_by_source_address;
use crate::metrics::PUSH_FIRED_TOTAL;
use crate::metrics::PUSH_SUPPRESSED_TOTAL;
use crate::versions_of;
use crate::AssembleMode;
use crate::DataInfo;
use crate::DataKind;
use crate::Datum;
use crate::DatumCache;
use crate::EngineConfig;
use crate::KeyedSequencer;
use crate::PushBatch;
use crate::PushDispatcher;
use crate::Result;
use crate::RevisionRegistry;
use crate::SequencerConfig;
use crate::Subscriber;
use crate::SubscriberDirectory;

/// The orchestrator of the push fan-out.
///
/// Change and registration events are serialized per logical key on the
/// [`KeyedSequencer`]; each task resolves the latest snapshot through the
/// [`DatumCache`], expands fan-out targets through the
/// [`RevisionRegistry`] when app/interface cross-referencing is involved,
/// regroups the key's watchers by delivery semantics, and hands one batch
/// per destination address to the [`PushDispatcher`].
pub struct ChangeFanoutEngine {
    inner: Arc<FanoutInner>,
    sequencer: KeyedSequencer,
}

struct FanoutInner {
    config: EngineConfig,
    cache: Arc<DatumCache>,
    revisions: Arc<RevisionRegistry>,
    directory: Arc<dyn SubscriberDirectory>,
    dispatcher: Arc<dyn PushDispatcher>,
    /// Process-wide ordering token counter, shared by all lanes
    fetch_seq: AtomicU64,
    /// Process-wide push batch id counter
    push_version_seq: AtomicU64,
}

impl ChangeFanoutEngine {
    /// Must run inside a tokio runtime; spawns the sequencer lanes.
    pub fn new(
        config: EngineConfig,
        sequencer_config: &SequencerConfig,
        cache: Arc<DatumCache>,
        revisions: Arc<RevisionRegistry>,
        directory: Arc<dyn SubscriberDirectory>,
        dispatcher: Arc<dyn PushDispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(FanoutInner {
                config,
                cache,
                revisions,
                directory,
                dispatcher,
                fetch_seq: AtomicU64::new(0),
                push_version_seq: AtomicU64::new(0),
            }),
            sequencer: KeyedSequencer::new(sequencer_config),
        }
    }

    /// React to a change notification for one logical key.
    ///
    /// Enqueues a task serialized under the key; returns false (with an
    /// error log) when the lane rejects the submission.
    pub fn fire_on_change(
        &self,
        data_center: &str,
        data_info: &DataInfo,
        expect_version: u64,
    ) -> bool {
        let inner = Arc::clone(&self.inner);
        let data_center_owned = data_center.to_string();
        let data_info_owned = data_info.clone();
        let key = data_info.data_info_id();
        let submitted = self.sequencer.submit(
            &key,
            Box::pin(async move {
                inner
                    .execute_on_change(&data_center_owned, &data_info_owned, expect_version)
                    .await
            }),
        );
        if let Err(e) = submitted {
            error!(
                data_info = %data_info,
                data_center,
                expect_version,
                error = %e,
                "failed to enqueue change task"
            );
            return false;
        }
        true
    }

    /// Compute and send the initial push for a newly registered watcher.
    pub fn fire_on_register(
        &self,
        subscriber: Arc<Subscriber>,
    ) -> bool {
        let inner = Arc::clone(&self.inner);
        let key = subscriber.data_info_id();
        let submitted = self.sequencer.submit(
            &key,
            Box::pin(async move { inner.execute_on_subscriber(subscriber).await }),
        );
        if let Err(e) = submitted {
            error!(key = %key, error = %e, "failed to enqueue register task");
            return false;
        }
        true
    }

    /// Send an empty snapshot set to one watcher, immediately and outside
    /// the sequencer.
    ///
    /// The batch carries maximum ordering tokens so it is never considered
    /// stale by the receiver.
    pub async fn fire_on_push_empty(
        &self,
        subscriber: Arc<Subscriber>,
    ) -> bool {
        let push_version = self.inner.next_push_version();
        let data_center = self.inner.config.data_center.clone();
        let result = self
            .inner
            .process_push(
                true,
                push_version,
                &data_center,
                &HashMap::new(),
                vec![Arc::clone(&subscriber)],
                u64::MAX,
                u64::MAX,
            )
            .await;
        match result {
            Ok(()) => {
                info!(subscriber = %subscriber, "fired empty push");
                true
            }
            Err(e) => {
                error!(subscriber = %subscriber, error = %e, "failed to fire empty push");
                false
            }
        }
    }

    /// Push an already-materialized snapshot to the key's current watchers,
    /// immediately and outside the sequencer.
    ///
    /// Aggregated-app snapshots are rejected on this path: they require the
    /// app-aware fan-out of [`ChangeFanoutEngine::fire_on_change`].
    pub async fn fire_on_datum(
        &self,
        datum: Datum,
    ) -> bool {
        if datum.data_info.kind == DataKind::AggregatedApp {
            error!(data_info = %datum.data_info, "unsupported data kind on the datum arrival path");
            return false;
        }
        let subscribers = self.inner.directory.watchers_of(&datum.data_info_id());
        let data_center = datum.data_center.clone();
        let push_version = datum.version;
        let seq_start = self.inner.next_fetch_seq();
        let seq_end = self.inner.next_fetch_seq();

        let datum = Arc::new(datum);
        let mut datum_map = HashMap::new();
        datum_map.insert(datum.data_info_id(), Arc::clone(&datum));

        match self
            .inner
            .process_push(true, push_version, &data_center, &datum_map, subscribers, seq_start, seq_end)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(data_info = %datum.data_info, error = %e, "failed to push arrived datum");
                false
            }
        }
    }

    /// Stop the sequencer lanes; queued tasks are dropped.
    pub fn shutdown(&self) {
        self.sequencer.shutdown();
    }
}

impl FanoutInner {
    fn next_fetch_seq(&self) -> u64 {
        self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn next_push_version(&self) -> u64 {
        self.push_version_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn execute_on_change(
        &self,
        data_center: &str,
        data_info: &DataInfo,
        expect_version: u64,
    ) -> Result<()> {
        let seq_start = self.next_fetch_seq();
        let datum = self.cache.get(data_info, data_center, expect_version).await?;
        let mut revisions = HashSet::new();
        match &datum {
            Some(datum) => {
                revisions = datum.revisions.clone();
                if datum.version < expect_version {
                    warn!(
                        data_center,
                        data_info = %data_info,
                        version = datum.version,
                        expect_version,
                        "loaded snapshot is below the expected version, pushing best-effort data"
                    );
                }
            }
            None => {
                warn!(
                    data_center,
                    data_info = %data_info,
                    expect_version,
                    "no snapshot found for changed key"
                );
            }
        }
        match data_info.kind {
            DataKind::AggregatedApp => {
                self.revisions.refresh_meta(&revisions).await?;
                self.on_app_datum_change(data_info, datum, seq_start, data_center).await
            }
            DataKind::Interface => {
                self.on_interface_datum_change(data_info, datum, seq_start, data_center).await
            }
        }
    }

    /// Fan an aggregated-app change out to the watchers of every interface
    /// the app implements.
    async fn on_app_datum_change(
        &self,
        app_info: &DataInfo,
        app_datum: Option<Arc<Datum>>,
        seq_start: u64,
        data_center: &str,
    ) -> Result<()> {
        let interface_ids = self.revisions.get_interfaces(&app_info.data_id);
        if interface_ids.is_empty() {
            warn!(data_info = %app_info, "app has no associated interfaces");
            return Ok(());
        }
        for interface_id in interface_ids {
            let groups = group_by_assemble_and_scope(self.directory.watchers_of(&interface_id));
            if groups.is_empty() {
                continue;
            }
            for (assemble_mode, scopes) in groups {
                let mut datum_map = HashMap::new();
                collect(&mut datum_map, app_datum.clone());

                match assemble_mode {
                    // app changes are irrelevant to interface-only watchers
                    AssembleMode::InterfaceOnly => continue,
                    AssembleMode::AppAndInterface => {
                        // the triggering app is already collected
                        let others = self
                            .app_datums_of_interface(
                                &interface_id,
                                data_center,
                                &app_info.instance_id,
                                Some(&app_info.data_id),
                            )
                            .await?;
                        datum_map.extend(others);
                        let interface_info = DataInfo::parse(&interface_id)?;
                        let interface_datum = self.cache.get(&interface_info, data_center, 0).await?;
                        collect(&mut datum_map, interface_datum);
                    }
                    AssembleMode::AppOnly => {
                        let others = self
                            .app_datums_of_interface(
                                &interface_id,
                                data_center,
                                &app_info.instance_id,
                                Some(&app_info.data_id),
                            )
                            .await?;
                        datum_map.extend(others);
                    }
                }

                // one causal marker per (interface, assemble mode) recomputation,
                // shared across its scope subgroups
                let push_version = self.next_push_version();
                let seq_end = self.next_fetch_seq();
                if datum_map.is_empty() {
                    warn!(interface_id = %interface_id, data_center, "pushing an empty datum map");
                }
                for subscribers in scopes.into_values() {
                    self.process_push(false, push_version, data_center, &datum_map, subscribers, seq_start, seq_end)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Fan an interface change out to the key's own watchers.
    async fn on_interface_datum_change(
        &self,
        interface_info: &DataInfo,
        interface_datum: Option<Arc<Datum>>,
        seq_start: u64,
        data_center: &str,
    ) -> Result<()> {
        let interface_id = interface_info.data_info_id();
        let groups = group_by_assemble_and_scope(self.directory.watchers_of(&interface_id));

        for (assemble_mode, scopes) in groups {
            let mut datum_map = HashMap::new();
            collect(&mut datum_map, interface_datum.clone());

            match assemble_mode {
                // interface changes are irrelevant to app-only watchers
                AssembleMode::AppOnly => continue,
                AssembleMode::AppAndInterface => {
                    let apps = self
                        .app_datums_of_interface(&interface_id, data_center, &interface_info.instance_id, None)
                        .await?;
                    datum_map.extend(apps);
                }
                // only the interface snapshot itself
                AssembleMode::InterfaceOnly => {}
            }

            let push_version = self.next_push_version();
            let seq_end = self.next_fetch_seq();
            if datum_map.is_empty() {
                warn!(interface_id = %interface_id, data_center, "pushing an empty datum map");
            }
            for subscribers in scopes.into_values() {
                self.process_push(false, push_version, data_center, &datum_map, subscribers, seq_start, seq_end)
                    .await?;
            }
        }
        Ok(())
    }

    /// Initial push for one new watcher, assembled per its mode.
    async fn execute_on_subscriber(
        &self,
        subscriber: Arc<Subscriber>,
    ) -> Result<()> {
        let data_center = self.config.data_center.clone();
        let data_info = subscriber.data_info.clone();
        let data_info_id = data_info.data_info_id();
        let seq_start = self.next_fetch_seq();

        let mut datum_map = HashMap::new();
        match subscriber.assemble_mode {
            AssembleMode::InterfaceOnly => {
                let datum = self.cache.get(&data_info, &data_center, 0).await?;
                collect(&mut datum_map, datum);
            }
            AssembleMode::AppAndInterface => {
                let apps = self
                    .app_datums_of_interface(&data_info_id, &data_center, &data_info.instance_id, None)
                    .await?;
                datum_map.extend(apps);
                let datum = self.cache.get(&data_info, &data_center, 0).await?;
                collect(&mut datum_map, datum);
            }
            AssembleMode::AppOnly => {
                let apps = self
                    .app_datums_of_interface(&data_info_id, &data_center, &data_info.instance_id, None)
                    .await?;
                datum_map.extend(apps);
            }
        }

        let push_version = self.next_push_version();
        let seq_end = self.next_fetch_seq();
        if datum_map.is_empty() {
            warn!(data_center = %data_center, subscriber = %subscriber, "pushing an empty datum map to new watcher");
        }
        self.process_push(true, push_version, &data_center, &datum_map, vec![subscriber], seq_start, seq_end)
            .await
    }

    /// Fresh snapshots of every app implementing `interface_id`, optionally
    /// excluding one app already collected by the caller.
    async fn app_datums_of_interface(
        &self,
        interface_id: &str,
        data_center: &str,
        instance_id: &str,
        exclude_app: Option<&str>,
    ) -> Result<HashMap<String, Arc<Datum>>> {
        let app_names: Vec<String> = self.revisions.get_app_revisions(interface_id).into_keys().collect();
        let mut datum_map = HashMap::new();
        for app_name in app_names {
            if exclude_app == Some(app_name.as_str()) {
                continue;
            }
            let app_info = DataInfo::aggregated_app(&*app_name, instance_id);
            let datum = self.cache.get(&app_info, data_center, 0).await?;
            collect(&mut datum_map, datum);
        }
        Ok(datum_map)
    }

    /// Filter, regroup and dispatch one assembled snapshot map.
    async fn process_push(
        &self,
        no_delay: bool,
        push_version: u64,
        data_center: &str,
        datum_map: &HashMap<String, Arc<Datum>>,
        subscribers: Vec<Arc<Subscriber>>,
        seq_start: u64,
        seq_end: u64,
    ) -> Result<()> {
        if subscribers.is_empty() {
            return Ok(());
        }
        // never deliver a push containing nothing newer than what the
        // watcher already holds
        let versions = versions_of(datum_map);
        let total = subscribers.len();
        let to_send: Vec<Arc<Subscriber>> = subscribers
            .into_iter()
            .filter(|subscriber| subscriber.needs_push(data_center, &versions))
            .collect();
        PUSH_SUPPRESSED_TOTAL.inc_by((total - to_send.len()) as u64);
        if to_send.is_empty() {
            return Ok(());
        }

        for (address, subscriber_map) in group_by_source_address(to_send) {
            PUSH_FIRED_TOTAL.inc();
            self.dispatcher
                .deliver(PushBatch {
                    no_delay,
                    push_version,
                    data_center: data_center.to_string(),
                    address,
                    subscribers: subscriber_map,
                    datum_map: datum_map.clone(),
                    seq_start,
                    seq_end,
                })
                .await?;
        }
        Ok(())
    }
}

fn collect(
    datum_map: &mut HashMap<String, Arc<Datum>>,
    datum: Option<Arc<Datum>>,
) {
    if let Some(datum) = datum {
        datum_map.insert(datum.data_info_id(), datum);
    }
}
