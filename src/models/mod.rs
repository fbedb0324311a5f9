//! Data models for rooms, members, and protocol messages.

pub mod event;
pub mod room;

pub use event::*;
pub use room::*;
