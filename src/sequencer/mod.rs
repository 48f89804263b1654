mod keyed_sequencer;
pub use keyed_sequencer::*;
