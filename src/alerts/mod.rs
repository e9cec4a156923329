mod processor;
mod runner;

pub use processor::{CheckOutcome, UserProcessor};
pub use runner::{AlertEngine, RunSummary};
