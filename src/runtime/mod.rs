//! Single-writer document backend and its change feed.

/// Event stream types emitted by the backend.
pub mod events;
/// Handle, command loop, and watcher fan-out.
pub mod handle;
