//! Permission gate.
//!
//! Decides whether a message may trigger a command:
//!
//! - owners pass everywhere
//! - direct chats pass
//! - groups follow their mode (`public`, `admin`, `private`)
//! - each command adds its own [`Access`] level on top
//!
//! Denials are silent; callers simply do nothing.

mod checker;

pub use checker::{Access, Permissions};
