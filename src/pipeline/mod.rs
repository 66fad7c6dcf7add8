pub mod reporter;
pub mod slot;

pub use reporter::{ActivityReporter, ThroughputSample};
pub use slot::FrameStore;
