mod revision_registry;
pub use revision_registry::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::AppRevision;
use crate::Result;

/// Authoritative revision metadata source (external collaborator).
///
/// The digest protocol keeps resync transfers incremental: the caller sends
/// a fingerprint of everything it knows and receives only the ids it is
/// missing.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync + 'static {
    /// Revision ids the caller does not know yet, given its digest
    async fn check_revisions(
        &self,
        digest: &str,
    ) -> Result<Vec<String>>;

    /// Full revision bodies for the given ids
    async fn fetch_revisions(
        &self,
        revision_ids: Vec<String>,
    ) -> Result<Vec<AppRevision>>;

    /// Persist a newly published revision
    async fn register_revision(
        &self,
        revision: &AppRevision,
    ) -> Result<()>;
}
