use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::DataInfo;
use crate::Datum;
use crate::DatumStore;
use crate::Result;

/// Read-through cache of versioned snapshots keyed by (dataInfoId,
/// dataCenter), with manual invalidate-and-reload on detected staleness.
///
/// Entries are shared and mutated concurrently from many lanes; per-entry
/// locking comes from the underlying map, no global lock serializes
/// unrelated keys.
pub struct DatumCache {
    // (data_info_id, data_center) -> shared snapshot
    entries: DashMap<(String, String), Arc<Datum>>,
    store: Arc<dyn DatumStore>,
}

impl DatumCache {
    pub fn new(store: Arc<dyn DatumStore>) -> Self {
        Self {
            entries: DashMap::new(),
            store,
        }
    }

    /// Return the cached snapshot when it already satisfies
    /// `expect_version`. Otherwise invalidate the entry and reload exactly
    /// once from the backing store; the result may still be below
    /// `expect_version`, or absent — staleness is bounded, not retried.
    ///
    /// The reload updates the shared entry visible to subsequent callers.
    pub async fn get(
        &self,
        data_info: &DataInfo,
        data_center: &str,
        expect_version: u64,
    ) -> Result<Option<Arc<Datum>>> {
        let cache_key = (data_info.data_info_id(), data_center.to_string());
        if let Some(entry) = self.entries.get(&cache_key) {
            if entry.version >= expect_version {
                return Ok(Some(Arc::clone(entry.value())));
            }
        }

        // absent or too old
        self.entries.remove(&cache_key);
        debug!(
            data_info = %data_info,
            data_center,
            expect_version,
            "reloading snapshot from the backing store"
        );
        match self.store.load_snapshot(data_info, data_center).await? {
            Some(datum) => {
                let datum = Arc::new(datum);
                self.entries.insert(cache_key, Arc::clone(&datum));
                Ok(Some(datum))
            }
            None => Ok(None),
        }
    }

    /// Number of cached entries, for monitoring
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
