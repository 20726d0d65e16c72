//! Worker process spawning, supervision and event hand-off.

mod command;
mod sink;
mod supervisor;

pub use command::*;
pub use sink::*;
pub use supervisor::*;
