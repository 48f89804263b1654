use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

/// Deterministic fingerprint over a full revision-id set.
///
/// Ids are sorted before hashing so insertion order never changes the
/// digest; the digest changes whenever the set grows.
pub fn revisions_digest(revision_ids: impl IntoIterator<Item = String>) -> String {
    let mut ids: Vec<String> = revision_ids.into_iter().collect();
    ids.sort_unstable();
    let mut hasher = DefaultHasher::new();
    for id in &ids {
        id.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}
