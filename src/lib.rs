mod cache;
mod config;
mod constants;
mod engine;
mod errors;
mod metrics;
mod model;
mod registry;
mod sequencer;
pub mod utils;

pub use cache::*;
pub use config::*;
pub use engine::*;
pub use errors::*;
pub use metrics::*;
pub use model::*;
pub use registry::*;
pub use sequencer::*;
