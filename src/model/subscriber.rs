use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;

use crate::DataInfo;
use crate::ModelError;

/// How a watcher wants cross-referenced app/interface data combined into one
/// push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssembleMode {
    /// Only the interface's own snapshot
    InterfaceOnly,
    /// Only the snapshots of apps implementing the interface
    AppOnly,
    /// Both of the above merged
    AppAndInterface,
}

impl AssembleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssembleMode::InterfaceOnly => "sub_interface",
            AssembleMode::AppOnly => "sub_app",
            AssembleMode::AppAndInterface => "sub_app_and_interface",
        }
    }
}

impl fmt::Display for AssembleMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssembleMode {
    type Err = ModelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sub_interface" => Ok(AssembleMode::InterfaceOnly),
            "sub_app" => Ok(AssembleMode::AppOnly),
            "sub_app_and_interface" => Ok(AssembleMode::AppAndInterface),
            other => Err(ModelError::InvalidAssembleMode(other.to_string())),
        }
    }
}

/// Delivery grouping of a watcher; deliveries from one recomputation are
/// partitioned by scope but share the same causal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Zone,
    DataCenter,
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Zone => "zone",
            Scope::DataCenter => "dataCenter",
            Scope::Global => "global",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ModelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "zone" => Ok(Scope::Zone),
            "dataCenter" => Ok(Scope::DataCenter),
            "global" => Ok(Scope::Global),
            other => Err(ModelError::InvalidScope(other.to_string())),
        }
    }
}

/// A registered interest in one logical key.
///
/// The per-data-center last-seen version map is advanced by the dispatcher
/// after successful delivery and consulted here for no-op suppression; it is
/// mutated and read concurrently from many lanes.
#[derive(Debug)]
pub struct Subscriber {
    /// Registration id, unique per watcher connection
    pub register_id: String,
    pub data_info: DataInfo,
    pub source_address: SocketAddr,
    pub assemble_mode: AssembleMode,
    pub scope: Scope,
    last_seen: RwLock<HashMap<String, u64>>,
}

impl Subscriber {
    pub fn new(
        register_id: impl Into<String>,
        data_info: DataInfo,
        source_address: SocketAddr,
        assemble_mode: AssembleMode,
        scope: Scope,
    ) -> Self {
        Self {
            register_id: register_id.into(),
            data_info,
            source_address,
            assemble_mode,
            scope,
            last_seen: RwLock::new(HashMap::new()),
        }
    }

    pub fn data_info_id(&self) -> String {
        self.data_info.data_info_id()
    }

    /// True when the snapshot map holds anything newer than what this
    /// subscriber last saw for `data_center`.
    ///
    /// An empty map always passes: empty pushes are deliberate and carry
    /// maximum ordering tokens.
    pub fn needs_push(
        &self,
        data_center: &str,
        versions: &HashMap<String, u64>,
    ) -> bool {
        if versions.is_empty() {
            return true;
        }
        let seen = self.last_seen.read().get(data_center).copied().unwrap_or(0);
        versions.values().any(|version| *version > seen)
    }

    /// Advanced by the dispatcher after a successful delivery; never moves
    /// backwards.
    pub fn mark_pushed(
        &self,
        data_center: &str,
        version: u64,
    ) {
        let mut last_seen = self.last_seen.write();
        let entry = last_seen.entry(data_center.to_string()).or_insert(0);
        if version > *entry {
            *entry = version;
        }
    }

    pub fn last_seen_version(
        &self,
        data_center: &str,
    ) -> u64 {
        self.last_seen.read().get(data_center).copied().unwrap_or(0)
    }
}

impl fmt::Display for Subscriber {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "Subscriber{{registerId={}, dataInfoId={}, sourceAddress={}, assembleMode={}, scope={}}}",
            self.register_id,
            self.data_info_id(),
            self.source_address,
            self.assemble_mode,
            self.scope
        )
    }
}

/// Group watchers by (assemble mode, scope); one combined snapshot is built
/// per mode, one dispatch round per scope subgroup.
pub fn group_by_assemble_and_scope(
    subscribers: impl IntoIterator<Item = Arc<Subscriber>>,
) -> HashMap<AssembleMode, HashMap<Scope, Vec<Arc<Subscriber>>>> {
    let mut groups: HashMap<AssembleMode, HashMap<Scope, Vec<Arc<Subscriber>>>> = HashMap::new();
    for subscriber in subscribers {
        groups
            .entry(subscriber.assemble_mode)
            .or_default()
            .entry(subscriber.scope)
            .or_default()
            .push(subscriber);
    }
    groups
}

/// Group watchers by destination address; one push batch is dispatched per
/// address, carrying that address's watchers keyed by register id.
pub fn group_by_source_address(
    subscribers: impl IntoIterator<Item = Arc<Subscriber>>,
) -> HashMap<SocketAddr, HashMap<String, Arc<Subscriber>>> {
    let mut groups: HashMap<SocketAddr, HashMap<String, Arc<Subscriber>>> = HashMap::new();
    for subscriber in subscribers {
        groups
            .entry(subscriber.source_address)
            .or_default()
            .insert(subscriber.register_id.clone(), subscriber);
    }
    groups
}
