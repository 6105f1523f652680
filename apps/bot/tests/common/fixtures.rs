//! Test fixtures for bot integration tests
//!
//! Provides a [`Harness`] that wires a [`Bot`] to the recording transport
//! and fake sources, plus helpers for building inbound events.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

use tubebot::protocol::{ChatMsgPayload, InboundEvent, LoginPayload, OutboundEvent, Rank, UserPayload};
use tubebot::{Bot, BotConfig, SessionExit, SourceRegistry};
use tubebot_shared_config::{DatabaseConfig, RoomConfig};

use super::mocks::{FakeFeedSource, FakeRandomSource, RecordingTransport};

/// How long a test waits for the bot to emit something
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Midnight UTC on the given day of January 2024
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

/// Bot configuration with millisecond delays
pub fn test_config(source_list: &std::path::Path) -> BotConfig {
    let mut config = BotConfig::for_room(RoomConfig::new(
        "https://cytu.be",
        "movienight",
        "tubebot",
        "hunter2",
    ));
    config.common.database = DatabaseConfig::in_memory();
    config.source_list = source_list.to_path_buf();
    config.retry_delay = Duration::from_millis(10);
    config.kill_grace = Duration::from_millis(10);
    config.reconnect_delay = Duration::from_millis(10);
    config
}

pub fn source_list_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// A chat line sent just now
pub fn chat(sender: &str, msg: &str) -> InboundEvent {
    chat_at(sender, msg, Utc::now())
}

pub fn chat_at(sender: &str, msg: &str, sent_at: DateTime<Utc>) -> InboundEvent {
    InboundEvent::ChatMsg(ChatMsgPayload {
        username: sender.to_string(),
        msg: msg.to_string(),
        time: sent_at.timestamp_millis(),
    })
}

pub fn roster(users: &[(&str, f64)]) -> InboundEvent {
    InboundEvent::UserList(
        users
            .iter()
            .map(|(name, rank)| UserPayload {
                name: name.to_string(),
                rank: Rank(*rank),
            })
            .collect(),
    )
}

pub fn login_ok() -> InboundEvent {
    InboundEvent::Login(LoginPayload {
        success: true,
        name: Some("tubebot".to_string()),
        error: None,
    })
}

/// A bot wired to in-memory collaborators
pub struct Harness {
    pub bot: Bot,
    pub transport: Arc<RecordingTransport>,
    pub outbound: mpsc::UnboundedReceiver<OutboundEvent>,
    pub feeds: Arc<FakeFeedSource>,
    pub random: Arc<FakeRandomSource>,
    pub registry: SourceRegistry,
    _source_list: NamedTempFile,
}

impl Harness {
    /// Build a harness whose source list file holds `source_list`
    pub async fn new(source_list: &str) -> Self {
        Self::with_random(source_list, FakeRandomSource::new()).await
    }

    pub async fn with_random(source_list: &str, random: Arc<FakeRandomSource>) -> Self {
        let file = source_list_file(source_list);
        let config = test_config(file.path());
        Self::build(file, config, random).await
    }

    /// Build a harness with an empty source list and a custom reconnect delay
    pub async fn with_reconnect_delay(delay: Duration) -> Self {
        let file = source_list_file("");
        let mut config = test_config(file.path());
        config.reconnect_delay = delay;
        Self::build(file, config, FakeRandomSource::new()).await
    }

    async fn build(file: NamedTempFile, config: BotConfig, random: Arc<FakeRandomSource>) -> Self {
        let registry = SourceRegistry::connect(config.database()).await.unwrap();
        let (transport, outbound) = RecordingTransport::new();
        let feeds = FakeFeedSource::new();

        let bot = Bot::new(
            config,
            transport.clone(),
            registry.clone(),
            feeds.clone(),
            random.clone(),
        );

        Self {
            bot,
            transport,
            outbound,
            feeds,
            random,
            registry,
            _source_list: file,
        }
    }

    /// Walk the session through connect, join, login and roster
    ///
    /// `mod` has rank 3 and `guest` rank 2.
    pub async fn login(&mut self) {
        assert_eq!(self.send(InboundEvent::Connected).await, None);
        assert_eq!(
            self.next_outbound().await,
            OutboundEvent::JoinChannel {
                name: "movienight".to_string()
            }
        );

        self.send(InboundEvent::ChannelOpts).await;
        assert!(matches!(
            self.next_outbound().await,
            OutboundEvent::Login { .. }
        ));

        self.send(login_ok()).await;
        assert_eq!(self.expect_chat().await, "Hello!");

        self.send(roster(&[("mod", 3.0), ("guest", 2.0)])).await;
    }

    pub async fn send(&mut self, event: InboundEvent) -> Option<SessionExit> {
        self.bot.handle_event(event).await
    }

    pub async fn next_outbound(&mut self) -> OutboundEvent {
        tokio::time::timeout(EVENT_TIMEOUT, self.outbound.recv())
            .await
            .expect("timed out waiting for the bot")
            .expect("transport dropped")
    }

    /// Next outbound event, which must be a chat line
    pub async fn expect_chat(&mut self) -> String {
        match self.next_outbound().await {
            OutboundEvent::ChatMsg { msg } => msg,
            other => panic!("expected a chat message, got {:?}", other),
        }
    }

    /// Next outbound event, which must be an enqueue request
    pub async fn expect_queue(&mut self) -> String {
        match self.next_outbound().await {
            OutboundEvent::Queue(request) => request.id,
            other => panic!("expected an enqueue request, got {:?}", other),
        }
    }

    /// Answer the pending enqueue request with an acknowledgment
    pub async fn ack(&mut self) {
        self.send(InboundEvent::Queue).await;
    }
}
