//! Session controller, its command client, and the events it consumes.

pub mod coordinator;
pub mod handle;
pub mod messages;
