//! Change feed: turns raw insert documents from the store into
//! [`ChangeEvent`]s.

mod change_feed_watcher;
pub use change_feed_watcher::*;
