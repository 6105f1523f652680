//! Tubebot library
//!
//! This module exposes the bot's components for the binary and for
//! integration tests.

pub mod bot;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod protocol;
pub mod queue_sync;
pub mod registry;
pub mod session;
pub mod sources;
pub mod transport;
pub mod watermark;

// Re-export commonly used types
pub use bot::{Bot, SessionExit};
pub use config::BotConfig;
pub use error::{BotError, BotResult, ErrorSeverity};
pub use queue_sync::{EnqueueOutcome, QueueSignal, QueueSynchronizer};
pub use registry::{Source, SourceRegistry};
pub use sources::{FeedItem, FeedSource, RandomSource};
pub use transport::{SocketIoTransport, Transport};
