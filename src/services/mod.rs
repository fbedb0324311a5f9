//! Business logic: room lifecycle use-cases.

pub mod room;

pub use room::RoomService;
