//! Client-side synchronization: watch a collection, mirror it, write to it.
//!
//! Every feature uses the same pieces. A [`watcher::Subscription`] delivers
//! full snapshots into a [`mirror::Mirror`]. Writes go through a
//! [`gateway::MutationGateway`]. A [`detail::DetailView`] follows one
//! selected document across snapshots. [`view::FeatureView`] owns all of
//! them for one activation.

pub mod backend;
pub mod detail;
pub mod error;
pub mod gateway;
pub mod mirror;
pub mod notice;
pub mod timers;
pub mod view;
pub mod watcher;

pub use backend::{BackendError, RemoteBackend, Snapshot};
pub use error::{SyncError, ValidationError};
pub use gateway::{DeleteOutcome, Draft};
pub use notice::{Notice, NoticeKind, Notifier};
pub use view::{FeatureView, ViewUpdate};
