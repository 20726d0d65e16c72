//! Configuration module.

mod loader;
mod selection;
mod types;

pub use loader::*;
pub use selection::*;
pub use types::*;
