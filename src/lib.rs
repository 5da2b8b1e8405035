//! Real-time collection sync for a two-person journaling app.
//!
//! Every feature (posts, songs, shopping list, ...) follows one pattern:
//! subscribe to a collection, mirror each full snapshot, write through a
//! validating gateway, and keep transient selection state consistent with
//! whatever snapshot arrives next. The pattern lives in [`sync`]; the
//! per-collection instantiations live in [`features`]. [`runtime`] provides
//! an in-process document backend with an optional SQLite journal.
//!
//! # Examples
//!
//! Shopping list against the in-memory backend:
//! ```
//! use duolog::{client::AppClient, config::SyncConfig, features::shopping::ShoppingList};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let client = AppClient::start(SyncConfig::default()).expect("start");
//! let mut list = client.open(ShoppingList).await.expect("open");
//! list.add_item("Milk", "http://x").await.expect("add");
//! assert_eq!(list.records()[0].name, "Milk");
//! client.shutdown().await.expect("shutdown");
//! # }
//! ```
//!
//! Durable backend with a journal file:
//! ```no_run
//! use duolog::{
//!     auth::Identity,
//!     client::AppClient,
//!     config::SyncConfig,
//!     features::posts::Posts,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = SyncConfig {
//!     database_path: Some("duolog.db".into()),
//!     ..SyncConfig::default()
//! };
//! let client = AppClient::start(config).expect("start");
//! client.sign_in(Identity::new("u1", "me@example.com"));
//! let mut board = client.open(Posts::category("home")).await.expect("open");
//! let id = board.add_post("Hello").await.expect("post");
//! board.open_detail(&id).expect("select");
//! board.add_reply("Nice!").await.expect("reply");
//! client.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Identity, author labels, and route guarding.
pub mod auth;
/// Object storage for uploaded media.
pub mod blob;
/// Application-wide client and startup.
pub mod client;
/// Configuration structs and TOML loading.
pub mod config;
/// Authoritative in-memory documents and queries.
pub mod core;
/// Documents, field maps, and patches.
pub mod document;
/// Per-collection features.
pub mod features;
/// Journal op model and persistence wrapper types.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Single-writer backend loop and its handle.
pub mod runtime;
/// Client-side synchronization pattern.
pub mod sync;
/// Shared primitive types and collection names.
pub mod types;
