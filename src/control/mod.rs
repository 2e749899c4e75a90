pub mod inputs;

pub use inputs::{CommandInput, QueuedEvent};
