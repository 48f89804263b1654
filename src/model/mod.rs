//! Core model of the registry push engine: logical keys, versioned
//! snapshots, subscribers and published app revisions.

mod data_info;
mod datum;
mod revision;
mod subscriber;

pub use data_info::*;
pub use datum::*;
pub use revision::*;
pub use subscriber::*;
