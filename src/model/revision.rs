use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::DataInfo;

/// One interface declared by an app revision, with the identity components
/// needed to derive its interface key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInterface {
    pub data_id: String,
    pub instance_id: String,
    pub group: String,
}

impl RevisionInterface {
    /// Key of the interface this entry points at
    pub fn data_info_id(&self) -> String {
        DataInfo::interface(&*self.data_id, &*self.instance_id, &*self.group).data_info_id()
    }
}

/// Immutable fingerprint of one application's published interface set.
///
/// Created once by a publisher and never changed; the registry indices built
/// from revisions only grow for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRevision {
    /// Content fingerprint identifying this revision
    pub revision: String,
    pub app_name: String,
    /// interfaceName -> identity of the interface it implements
    pub interfaces: HashMap<String, RevisionInterface>,
}

impl AppRevision {
    pub fn new(
        revision: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            revision: revision.into(),
            app_name: app_name.into(),
            interfaces: HashMap::new(),
        }
    }
}

impl fmt::Display for AppRevision {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "AppRevision{{revision={}, appName={}, interfaces={}}}",
            self.revision,
            self.app_name,
            self.interfaces.len()
        )
    }
}
