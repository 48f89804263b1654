mod datum_cache;
pub use datum_cache::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Datum;
use crate::DataInfo;
use crate::Result;

/// Authoritative snapshot store (external collaborator).
///
/// The store is eventually consistent: a reload after a change notification
/// may still return a version below the one the notification announced.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatumStore: Send + Sync + 'static {
    /// Load the current snapshot of `data_info` within one data center.
    async fn load_snapshot(
        &self,
        data_info: &DataInfo,
        data_center: &str,
    ) -> Result<Option<Datum>>;
}
