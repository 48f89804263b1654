// -
// Model identity derivation

/// Separator joining the components of a dataInfoId
pub(crate) const DATA_INFO_ID_SEPARATOR: &str = "#@#";

/// Group carried by aggregated-app keys
pub(crate) const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

// -
// Single-flight keys

/// Fixed key serializing full revision resyncs; only one refresh is in
/// flight process-wide at any instant
pub(crate) const REFRESH_ALL_KEY: &str = "refresh-all";

/// Prefix for per-revision registration collapse keys
pub(crate) const REVISION_REGISTER_KEY_PREFIX: &str = "revision-register:";
