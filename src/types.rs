//! Shared primitive IDs, collection names, and ordering enums.

use serde::{Deserialize, Serialize};

/// Server-assigned document identifier.
pub type DocId = String;
/// Monotonic operation sequence number.
pub type OpSeq = u64;
/// Identifier of one registered collection watcher.
pub type WatchId = u64;
/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;

/// Well-known collection names.
pub mod collections {
    /// Category-scoped posts with embedded replies.
    pub const POSTS: &str = "posts";
    /// Favourite things.
    pub const FAVORITES: &str = "favorites";
    /// Shared songs.
    pub const SONGS: &str = "songs";
    /// Short stories.
    pub const STORIES: &str = "stories";
    /// Uploaded photos and videos.
    pub const MEDIA: &str = "media";
    /// Shopping list items.
    pub const SHOPPING_LIST: &str = "shoppingList";
    /// Mood check-ins.
    pub const MOODS: &str = "moods";
    /// Period logs.
    pub const PERIODS: &str = "periods";
    /// Journal events.
    pub const EVENTS: &str = "events";
    /// Countdown timers.
    pub const TIMERS: &str = "timers";
    /// Saved reels.
    pub const REELS: &str = "reels";
    /// User profiles keyed by uid.
    pub const USERS: &str = "users";
    /// Pet mascot state.
    pub const PETS: &str = "pets";
}

/// Sort direction for a client-requested ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortDirection {
    /// Smallest key first.
    #[default]
    Asc,
    /// Largest key first.
    Desc,
}

/// Current wall-clock time in milliseconds.
pub fn now_ms() -> TimestampMs {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as TimestampMs)
        .unwrap_or(0)
}
