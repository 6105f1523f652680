//! YouTube client for tubebot
//!
//! This crate provides the two external content sources the bot consumes:
//! - Channel upload feeds (Atom XML), newest entry first
//! - Random videos picked from a search results page
//!
//! # Example
//!
//! ```rust,no_run
//! use tubebot_youtube_client::YoutubeClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = YoutubeClient::new()?;
//!
//! // Newest uploads first
//! let entries = client.fetch_feed("UC_x5XG1OV2P6uZZ5FSM9Ttw").await?;
//! for entry in entries.iter().filter(|e| !e.is_short_form()) {
//!     println!("{} {}", entry.published, entry.video_id);
//! }
//!
//! // One random video from a pool of width 3
//! if let Some(id) = client.find_random(3).await? {
//!     println!("random: {}", id);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::{clamp_pool_width, YoutubeClient, MAX_POOL_WIDTH, MIN_POOL_WIDTH};
pub use error::{YoutubeError, YoutubeResult};
pub use models::FeedEntry;
