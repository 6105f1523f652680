//! Shared test utilities for tubebot workspace
//!
//! This crate provides mock implementations of the HTTP services the bot
//! talks to, so tests run without network access.
//!
//! # Mock Services
//!
//! - [`MockYoutubeServer`] - channel feeds and search result pages
//! - [`MockRoomServer`] - per-channel socket configuration for discovery
//!
//! # Example
//!
//! ```rust,ignore
//! use tubebot_test_utils::{FeedEntryFixture, MockYoutubeServer};
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let youtube = MockYoutubeServer::start().await;
//!     youtube.mock_search(&["dQw4w9WgXcQ"]).await;
//!
//!     // Use youtube.url() to configure your client
//! }
//! ```

mod room;
mod youtube;

pub use room::MockRoomServer;
pub use youtube::{atom_feed, search_page, FeedEntryFixture, MockYoutubeServer};
