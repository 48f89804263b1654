mod fanout;
pub use fanout::*;

#[cfg(test)]
mod fanout_test;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Datum;
use crate::Result;
use crate::Subscriber;

/// One assembled push to one destination address.
///
/// `seq_start`/`seq_end` bracket the fan-out computation that produced the
/// batch: when `a.seq_start > b.seq_end`, batch `a`'s snapshot was captured
/// strictly after `b`'s and supersedes it for the same destination and key.
#[derive(Debug, Clone)]
pub struct PushBatch {
    /// Bypass any dispatcher-side delay/merging
    pub no_delay: bool,
    /// Identifies the batch itself for downstream dedup; not persisted
    pub push_version: u64,
    pub data_center: String,
    pub address: SocketAddr,
    /// This address's watchers, keyed by register id
    pub subscribers: HashMap<String, Arc<Subscriber>>,
    /// The combined snapshot, keyed by dataInfoId
    pub datum_map: HashMap<String, Arc<Datum>>,
    pub seq_start: u64,
    pub seq_end: u64,
}

/// Lookup of registered watchers by logical data key (external collaborator).
#[cfg_attr(test, automock)]
pub trait SubscriberDirectory: Send + Sync + 'static {
    /// Current watchers registered on `data_info_id`
    fn watchers_of(
        &self,
        data_info_id: &str,
    ) -> Vec<Arc<Subscriber>>;
}

/// Network delivery of an assembled push batch (external collaborator).
///
/// Delivery advances each subscriber's last-seen versions on success; this
/// core only consults them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PushDispatcher: Send + Sync + 'static {
    async fn deliver(
        &self,
        batch: PushBatch,
    ) -> Result<()>;
}
