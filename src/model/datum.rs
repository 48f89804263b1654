use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::DataInfo;

/// Versioned snapshot of one logical key within one data center.
///
/// Immutable once read by the engine: the authoritative store creates and
/// replaces snapshots, this core only observes them. `version` is scoped per
/// (key, data center); unrelated keys have independent version spaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datum {
    pub data_info: DataInfo,
    pub data_center: String,
    pub version: u64,
    /// Opaque published values keyed by publisher register id
    pub values: HashMap<String, Vec<u8>>,
    /// Revision ids contributing to this snapshot
    pub revisions: HashSet<String>,
}

impl Datum {
    pub fn new(
        data_info: DataInfo,
        data_center: impl Into<String>,
        version: u64,
    ) -> Self {
        Self {
            data_info,
            data_center: data_center.into(),
            version,
            values: HashMap::new(),
            revisions: HashSet::new(),
        }
    }

    pub fn data_info_id(&self) -> String {
        self.data_info.data_info_id()
    }
}

impl fmt::Display for Datum {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "Datum{{dataInfoId={}, dataCenter={}, version={}, values={}, revisions={}}}",
            self.data_info_id(),
            self.data_center,
            self.version,
            self.values.len(),
            self.revisions.len()
        )
    }
}

/// Per-key versions of a snapshot map, used for staleness filtering
pub fn versions_of(datum_map: &HashMap<String, Arc<Datum>>) -> HashMap<String, u64> {
    datum_map.iter().map(|(id, datum)| (id.clone(), datum.version)).collect()
}
