//! Run lifecycle: state machine, progress, credential relay and controller.

mod auth;
mod controller;
mod progress;
mod request;
mod state;

pub use auth::*;
pub use controller::*;
pub use progress::*;
pub use request::*;
pub use state::*;
