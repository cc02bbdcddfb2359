//! Collaboration plumbing: annotation sync, optimistic local state, presence.
//!
//! The transport is abstracted behind small channel traits so the same store
//! and broadcaster run against the in-memory loopback bus in tests and a real
//! network client in an application shell.

pub mod channel;
pub mod memory;
pub mod presence;
pub mod store;

pub use channel::{AnnotationChannel, AnnotationEvent, ChannelError, PresenceChannel};
pub use memory::{MemoryBus, MemoryClient};
pub use presence::{PresenceBroadcaster, EMIT_INTERVAL, STALE_AFTER};
pub use store::AnnotationStore;
