//! Long-running command handlers
//!
//! Each handler owns the [`BusyGuard`] for its whole run, so the session
//! returns to idle only after the handler's final chat message.

use std::sync::Arc;

use crate::config::BotConfig;
use crate::messages;
use crate::queue_sync::QueueSynchronizer;
use crate::registry::{Source, SourceRegistry};
use crate::session::{BusyGuard, SessionHandle};
use crate::sources::{FeedSource, RandomSource};
use crate::transport::Transport;
use crate::watermark::{ScanResult, WatermarkTracker};

/// Everything a handler needs, shared between the event loop and tasks
pub struct BotContext {
    pub config: BotConfig,
    pub session: SessionHandle,
    pub transport: Arc<dyn Transport>,
    pub registry: SourceRegistry,
    pub feeds: Arc<dyn FeedSource>,
    pub random: Arc<dyn RandomSource>,
    pub tracker: WatermarkTracker,
    pub queue: QueueSynchronizer,
}

/// Rescan every source and enqueue what is new
pub async fn run_content(ctx: Arc<BotContext>, guard: BusyGuard) {
    ctx.transport.say(messages::SEARCHING).await;

    if let Err(e) = ctx
        .registry
        .refresh(&ctx.config.source_list, ctx.feeds.as_ref())
        .await
    {
        tracing::warn!(path = %ctx.config.source_list.display(), "Source list refresh failed");
        e.log();
    }

    let sources = match ctx.registry.list().await {
        Ok(sources) => sources,
        Err(e) => {
            e.log();
            Vec::new()
        }
    };

    let mut pending: Vec<(Source, ScanResult)> = Vec::new();
    for source in sources {
        let scan = ctx.tracker.scan_source(&source).await;
        if scan.is_empty() {
            // Seeds a source that had no watermark yet
            if let Some(ts) = scan.new_watermark {
                advance(&ctx.registry, &source, ts).await;
            }
            continue;
        }
        pending.push((source, scan));
    }

    let total: usize = pending.iter().map(|(_, scan)| scan.items.len()).sum();
    if total == 0 {
        ctx.transport.say(messages::NO_CONTENT).await;
        drop(guard);
        return;
    }

    tracing::info!(sources = pending.len(), items = total, "Adding new content");
    ctx.transport.say(&messages::adding(total)).await;

    for (source, scan) in pending {
        let ids: Vec<String> = scan.items.into_iter().map(|item| item.id).collect();
        let outcomes = ctx.queue.submit(&ids).await;

        let accepted = outcomes.iter().filter(|(_, o)| o.is_accepted()).count();
        tracing::info!(
            source_id = %source.source_id,
            submitted = ids.len(),
            accepted,
            "Finished source"
        );

        if accepted > 0 {
            if let Some(ts) = scan.new_watermark {
                advance(&ctx.registry, &source, ts).await;
            }
        }
    }

    ctx.transport.say(messages::CONTENT_DONE).await;
    drop(guard);
}

async fn advance(registry: &SourceRegistry, source: &Source, ts: chrono::DateTime<chrono::Utc>) {
    if let Err(e) = registry.advance_watermark(&source.source_id, ts).await {
        tracing::warn!(source_id = %source.source_id, "Could not store watermark");
        e.log();
    }
}

/// Enqueue one random item
pub async fn run_random(ctx: Arc<BotContext>, guard: BusyGuard, pool_width: u32) {
    let message = match ctx.random.find_random_item(pool_width).await {
        Err(e) => {
            e.log();
            messages::RANDOM_LOOKUP_FAILED.to_string()
        }
        Ok(None) => messages::RANDOM_NONE.to_string(),
        Ok(Some(id)) => {
            let outcomes = ctx.queue.submit(std::slice::from_ref(&id)).await;
            let accepted = outcomes.iter().any(|(_, o)| o.is_accepted());
            if accepted {
                messages::random_added(&id)
            } else {
                messages::random_rejected(&id)
            }
        }
    };

    ctx.transport.say(&message).await;
    drop(guard);
}

/// Say goodbye, wait for delivery, then disconnect
///
/// The session stays busy until the disconnect lands so no further command
/// starts.
pub async fn run_kill(ctx: Arc<BotContext>, guard: BusyGuard) {
    ctx.transport.say(messages::FAREWELL).await;
    tokio::time::sleep(ctx.config.kill_grace).await;

    guard.hold_until_disconnect();
    tracing::info!("Disconnecting on request");
    if let Err(e) = ctx.transport.disconnect().await {
        e.log();
    }
}
