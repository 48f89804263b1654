use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use dashmap::DashSet;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::constants::REFRESH_ALL_KEY;
use crate::constants::REVISION_REGISTER_KEY_PREFIX;
use crate::metrics::REVISION_REFRESH_FAILED_TOTAL;
use crate::metrics::REVISION_REFRESH_TOTAL;
use crate::utils::digest::revisions_digest;
use crate::utils::single_flight::SingleFlight;
use crate::AppRevision;
use crate::MetaError;
use crate::MetadataSource;
use crate::Result;

/// Call-collapsing cache of published app revisions and the bidirectional
/// indices between interfaces and the apps implementing them.
///
/// Indices are grow-only for the process lifetime: a resync with the
/// authoritative metadata source only adds, entries are never evicted.
pub struct RevisionRegistry {
    source: Arc<dyn MetadataSource>,
    // revision -> full revision body
    registry: DashMap<String, Arc<AppRevision>>,
    // interface dataInfoId -> appName -> revisions implementing it
    interface_revisions: DashMap<String, DashMap<String, DashSet<String>>>,
    // appName -> interface dataInfoIds it implements
    app_interfaces: DashMap<String, DashSet<String>>,
    // fingerprint over the full known revision-id set
    keys_digest: ArcSwap<String>,
    single_flight: SingleFlight,
}

impl RevisionRegistry {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            registry: DashMap::new(),
            interface_revisions: DashMap::new(),
            app_interfaces: DashMap::new(),
            keys_digest: ArcSwap::from_pointee(String::new()),
            single_flight: SingleFlight::new(),
        }
    }

    /// Register a newly published revision with the metadata source.
    ///
    /// No-op when the revision is already indexed. Concurrent callers for
    /// the same unseen revision collapse into one remote call and share its
    /// outcome.
    pub async fn register(
        &self,
        revision: AppRevision,
    ) -> Result<()> {
        if self.registry.contains_key(&revision.revision) {
            return Ok(());
        }
        let key = format!("{}{}", REVISION_REGISTER_KEY_PREFIX, revision.revision);
        let source = Arc::clone(&self.source);
        self.single_flight
            .execute(&key, move || async move { source.register_revision(&revision).await })
            .await
    }

    /// Incremental resync against the metadata source.
    ///
    /// Only one refresh is in flight process-wide; a failure is raised to
    /// every collapsed waiter, and indices folded before the failure remain.
    pub async fn refresh_all(&self) -> Result<()> {
        self.single_flight
            .execute(REFRESH_ALL_KEY, || async {
                REVISION_REFRESH_TOTAL.inc();
                self.do_refresh().await.map_err(|e| {
                    REVISION_REFRESH_FAILED_TOTAL.inc();
                    error!(error = %e, "revision refresh failed");
                    MetaError::RefreshFailed(e.to_string()).into()
                })
            })
            .await
    }

    async fn do_refresh(&self) -> Result<()> {
        let digest = self.keys_digest.load_full();
        let unknown = self.source.check_revisions(&digest).await?;
        let revisions = self.source.fetch_revisions(unknown).await?;
        let fetched = revisions.len();
        for revision in revisions {
            self.on_new_revision(revision);
        }
        if fetched > 0 {
            let ids: Vec<String> = self.registry.iter().map(|entry| entry.key().clone()).collect();
            self.keys_digest.store(Arc::new(revisions_digest(ids)));
        }
        Ok(())
    }

    /// Cached revision body, resyncing once on a miss.
    ///
    /// A miss pays for a full incremental resync, not a point fetch; the
    /// implicit refresh can fail this caller.
    pub async fn get_revision(
        &self,
        revision: &str,
    ) -> Result<Option<Arc<AppRevision>>> {
        if let Some(found) = self.registry.get(revision) {
            return Ok(Some(Arc::clone(found.value())));
        }
        self.refresh_all().await?;
        Ok(self.registry.get(revision).map(|found| Arc::clone(found.value())))
    }

    /// Apps implementing `interface_data_info_id`, each with the revisions
    /// declaring it. Empty when the interface is unknown.
    pub fn get_app_revisions(
        &self,
        interface_data_info_id: &str,
    ) -> HashMap<String, HashSet<String>> {
        match self.interface_revisions.get(interface_data_info_id) {
            Some(apps) => apps
                .iter()
                .map(|app| {
                    let revisions = app.value().iter().map(|r| r.clone()).collect();
                    (app.key().clone(), revisions)
                })
                .collect(),
            None => HashMap::new(),
        }
    }

    /// Interface dataInfoIds implemented by `app_name`. Empty when unknown.
    pub fn get_interfaces(
        &self,
        app_name: &str,
    ) -> HashSet<String> {
        match self.app_interfaces.get(app_name) {
            Some(interfaces) => interfaces.iter().map(|i| i.clone()).collect(),
            None => HashSet::new(),
        }
    }

    /// Bulk warm-up: force every id through [`RevisionRegistry::get_revision`].
    pub async fn refresh_meta(
        &self,
        revisions: &HashSet<String>,
    ) -> Result<()> {
        if revisions.is_empty() {
            return Ok(());
        }
        for revision in revisions {
            self.get_revision(revision).await?;
        }
        Ok(())
    }

    fn on_new_revision(
        &self,
        revision: AppRevision,
    ) {
        if revision.interfaces.is_empty() {
            warn!(revision = %revision, "revision declares no interfaces, skipped");
            return;
        }
        for interface in revision.interfaces.values() {
            let data_info_id = interface.data_info_id();
            self.interface_revisions
                .entry(data_info_id.clone())
                .or_default()
                .entry(revision.app_name.clone())
                .or_default()
                .insert(revision.revision.clone());

            self.app_interfaces
                .entry(revision.app_name.clone())
                .or_default()
                .insert(data_info_id);
        }
        info!(revision = %revision, "new revision indexed");
        self.registry.insert(revision.revision.clone(), Arc::new(revision));
    }

    /// Current digest over the full known revision-id set
    pub fn digest(&self) -> String {
        self.keys_digest.load().as_ref().clone()
    }

    /// Number of indexed revisions, for monitoring
    pub fn known_revisions(&self) -> usize {
        self.registry.len()
    }
}
