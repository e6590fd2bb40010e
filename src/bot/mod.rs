//! Bot core: shared state, event dispatch, sessions and the HTTP surface.

pub mod dispatcher;
pub mod session;
pub mod webhook;

#[cfg(test)]
pub mod testing;

pub use dispatcher::{AppState, Dispatcher, EVENT_QUEUE};
