//! In-memory collaborators for bot integration tests
//!
//! [`RecordingTransport`] records every outbound event and streams it to
//! the test so the test can answer queue requests; the fake sources serve
//! canned feeds and random picks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use tubebot::protocol::OutboundEvent;
use tubebot::{BotError, BotResult, FeedItem, FeedSource, RandomSource, Transport};

/// Transport that records outbound events instead of sending them
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundEvent>>,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    connected: AtomicBool,
    disconnect_count: AtomicUsize,
    reconnect_count: AtomicUsize,
}

impl RecordingTransport {
    /// Create a connected transport and the stream of events it emits
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            outbound,
            connected: AtomicBool::new(true),
            disconnect_count: AtomicUsize::new(0),
            reconnect_count: AtomicUsize::new(0),
        });
        (transport, rx)
    }

    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().unwrap().clone()
    }

    /// Chat lines sent so far, in order
    pub fn chat_messages(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|event| match event {
                OutboundEvent::ChatMsg { msg } => Some(msg),
                _ => None,
            })
            .collect()
    }

    /// Ids of every enqueue request sent so far, retries included
    pub fn queued_ids(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|event| match event {
                OutboundEvent::Queue(request) => Some(request.id),
                _ => None,
            })
            .collect()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnect_count.load(Ordering::SeqCst)
    }

    pub fn reconnect_count(&self) -> usize {
        self.reconnect_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn emit(&self, event: OutboundEvent) -> BotResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BotError::NotConnected);
        }
        self.sent.lock().unwrap().push(event.clone());
        let _ = self.outbound.send(event);
        Ok(())
    }

    async fn disconnect(&self) -> BotResult<()> {
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        self.set_connected(false);
        Ok(())
    }

    async fn reconnect(&self) -> BotResult<()> {
        self.reconnect_count.fetch_add(1, Ordering::SeqCst);
        self.set_connected(true);
        Ok(())
    }
}

/// Feed source serving canned entries per source id
#[derive(Default)]
pub struct FakeFeedSource {
    feeds: Mutex<HashMap<String, Vec<FeedItem>>>,
    failing: Mutex<HashSet<String>>,
    fetches: AtomicUsize,
}

impl FakeFeedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `entries` (newest first) for `source_id`
    pub fn set_feed(&self, source_id: &str, entries: Vec<FeedItem>) {
        self.feeds
            .lock()
            .unwrap()
            .insert(source_id.to_string(), entries);
    }

    /// Make every fetch for `source_id` fail
    pub fn fail(&self, source_id: &str) {
        self.failing.lock().unwrap().insert(source_id.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for FakeFeedSource {
    async fn fetch_entries(&self, source_id: &str) -> BotResult<Vec<FeedItem>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(source_id) {
            return Err(BotError::Internal(format!("feed for {} unavailable", source_id)));
        }
        Ok(self
            .feeds
            .lock()
            .unwrap()
            .get(source_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Random source returning a fixed pick and recording requested widths
#[derive(Default)]
pub struct FakeRandomSource {
    pick: Mutex<Option<String>>,
    widths: Mutex<Vec<u32>>,
}

impl FakeRandomSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn returning(id: &str) -> Arc<Self> {
        let source = Self::new();
        *source.pick.lock().unwrap() = Some(id.to_string());
        source
    }

    pub fn requested_widths(&self) -> Vec<u32> {
        self.widths.lock().unwrap().clone()
    }
}

#[async_trait]
impl RandomSource for FakeRandomSource {
    async fn find_random_item(&self, pool_width: u32) -> BotResult<Option<String>> {
        self.widths.lock().unwrap().push(pool_width);
        Ok(self.pick.lock().unwrap().clone())
    }
}
