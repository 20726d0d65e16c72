//! Worker line protocol: event types, classification and log filtering.

mod classifier;
mod events;
mod filter;

pub use classifier::*;
pub use events::*;
pub use filter::*;
