use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DATA_INFO_ID_SEPARATOR;
use crate::constants::DEFAULT_GROUP;
use crate::ModelError;
use crate::Result;

/// Classification of a publishable data item.
///
/// An `Interface` key carries the values published under one service
/// interface; an `AggregatedApp` key carries the combined values of one
/// application revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Interface,
    AggregatedApp,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Interface => "interface",
            DataKind::AggregatedApp => "app",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = ModelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "interface" => Ok(DataKind::Interface),
            "app" => Ok(DataKind::AggregatedApp),
            other => Err(ModelError::InvalidDataKind(other.to_string())),
        }
    }
}

/// Composite identity of a publishable data item.
///
/// Equal tuples derive equal `data_info_id()` strings; the derived string is
/// the map key used everywhere in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataInfo {
    pub data_id: String,
    pub instance_id: String,
    pub group: String,
    pub kind: DataKind,
}

impl DataInfo {
    pub fn interface(
        data_id: impl Into<String>,
        instance_id: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            data_id: data_id.into(),
            instance_id: instance_id.into(),
            group: group.into(),
            kind: DataKind::Interface,
        }
    }

    /// Aggregated-app keys carry the fixed default group
    pub fn aggregated_app(
        data_id: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            data_id: data_id.into(),
            instance_id: instance_id.into(),
            group: DEFAULT_GROUP.to_string(),
            kind: DataKind::AggregatedApp,
        }
    }

    /// Deterministic string derivation used as the map key everywhere
    pub fn data_info_id(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.data_id,
            self.instance_id,
            self.group,
            self.kind,
            sep = DATA_INFO_ID_SEPARATOR
        )
    }

    /// Inverse of [`DataInfo::data_info_id`]
    pub fn parse(data_info_id: &str) -> Result<Self> {
        let parts: Vec<&str> = data_info_id.split(DATA_INFO_ID_SEPARATOR).collect();
        if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(ModelError::InvalidDataInfoId(data_info_id.to_string()).into());
        }
        Ok(Self {
            data_id: parts[0].to_string(),
            instance_id: parts[1].to_string(),
            group: parts[2].to_string(),
            kind: parts[3].parse::<DataKind>()?,
        })
    }
}

impl fmt::Display for DataInfo {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "DataInfo{{dataId={}, instanceId={}, group={}, kind={}}}",
            self.data_id, self.instance_id, self.group, self.kind
        )
    }
}
