//! Push Fan-out Engine Error Hierarchy
//!
//! Defines error types for the change-propagation core, categorized by
//! subsystem: revision metadata, keyed task scheduling, backing store /
//! delivery, and model identity parsing.

use std::net::SocketAddr;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Revision metadata subsystem failures (resync, registration)
    #[error(transparent)]
    Meta(#[from] MetaError),

    /// Keyed sequencer submission and scheduling failures
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Backing store and push delivery failures
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Malformed model identities
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// Incremental resync against the metadata source failed; indices folded
    /// before the failure remain in place
    #[error("revision refresh failed: {0}")]
    RefreshFailed(String),

    /// Remote registration of a newly published revision failed
    #[error("revision register failed: {0}")]
    RegisterFailed(String),

    /// Failure observed by a caller that collapsed onto another caller's
    /// in-flight execution
    #[error("collapsed call failed: {0}")]
    Collapsed(String),

    /// Metadata source unreachable or returned a malformed response
    #[error("metadata source unavailable: {0}")]
    SourceUnavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Lane queue is full; the task was dropped at submission
    #[error("lane {lane} queue is full, task for key {key} rejected")]
    Overloaded { lane: usize, key: String },

    /// Sequencer has been shut down; no further tasks are accepted
    #[error("sequencer is shut down")]
    ShutDown,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Snapshot reload from the authoritative store failed
    #[error("snapshot load failed: {0}")]
    LoadFailed(String),

    /// Dispatcher rejected or failed a push batch
    #[error("push delivery to {address} failed: {reason}")]
    DeliverFailed { address: SocketAddr, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// dataInfoId string does not match the `dataId#@#instanceId#@#group#@#kind` derivation
    #[error("invalid dataInfoId: {0}")]
    InvalidDataInfoId(String),

    #[error("unsupported assemble mode: {0}")]
    InvalidAssembleMode(String),

    #[error("unsupported scope: {0}")]
    InvalidScope(String),

    #[error("unsupported data kind: {0}")]
    InvalidDataKind(String),
}
