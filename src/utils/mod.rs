pub mod digest;

pub mod single_flight;

pub(crate) mod util;
