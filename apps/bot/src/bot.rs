//! Inbound event loop
//!
//! [`Bot`] consumes transport events in arrival order, feeds the session
//! state machine, forwards queue responses to the synchronizer and spawns
//! command handlers. Handlers run on their own task so acknowledgments keep
//! flowing while a handler waits for them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::BotConfig;
use crate::dispatcher::{Command, Decision, Dispatcher};
use crate::handlers::{self, BotContext};
use crate::messages;
use crate::protocol::{ChatMsgPayload, InboundEvent, LoginPayload, OutboundEvent};
use crate::queue_sync::{QueueSignal, QueueSynchronizer, SignalSender};
use crate::registry::SourceRegistry;
use crate::session::SessionHandle;
use crate::sources::{FeedSource, RandomSource};
use crate::transport::Transport;
use crate::watermark::WatermarkTracker;

/// Why an event loop run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// Disconnected after a `kill` command
    Killed,
    /// Connection dropped; the caller should reconnect
    ConnectionLost,
}

pub struct Bot {
    ctx: Arc<BotContext>,
    dispatcher: Dispatcher,
    signals: SignalSender,
    in_flight: Option<JoinHandle<()>>,
    pending_reconnect: Option<JoinHandle<()>>,
    shutdown_requested: bool,
}

impl Bot {
    pub fn new(
        config: BotConfig,
        transport: Arc<dyn Transport>,
        registry: SourceRegistry,
        feeds: Arc<dyn FeedSource>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let (queue, signals) = QueueSynchronizer::new(
            transport.clone(),
            config.retry_delay,
            config.max_enqueue_attempts,
        );
        let dispatcher = Dispatcher::new(&config);
        let ctx = BotContext {
            tracker: WatermarkTracker::new(feeds.clone()),
            session: SessionHandle::new(),
            config,
            transport,
            registry,
            feeds,
            random,
            queue,
        };

        Self {
            ctx: Arc::new(ctx),
            dispatcher,
            signals,
            in_flight: None,
            pending_reconnect: None,
            shutdown_requested: false,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.ctx.session
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.ctx.registry
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Reset the session before a new connection attempt
    pub fn prepare_reconnect(&mut self) {
        self.ctx.session.lock().begin_connecting();
    }

    /// Wait for the running handler, if any, to finish
    pub async fn wait_for_operation(&mut self) {
        if let Some(task) = self.in_flight.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Command handler panicked");
            }
        }
    }

    /// Wait for a scheduled reconnect attempt, if any, to finish
    pub async fn wait_for_reconnect(&mut self) {
        if let Some(task) = self.pending_reconnect.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Reconnect task panicked");
                }
            }
        }
    }

    /// Process events until the connection ends
    pub async fn run(&mut self, events: &mut mpsc::Receiver<InboundEvent>) -> SessionExit {
        while let Some(event) = events.recv().await {
            if let Some(exit) = self.handle_event(event).await {
                return exit;
            }
        }
        tracing::warn!("Transport event channel closed");
        SessionExit::ConnectionLost
    }

    /// Apply one inbound event; returns `Some` when the connection ended
    pub async fn handle_event(&mut self, event: InboundEvent) -> Option<SessionExit> {
        match event {
            InboundEvent::Connected => {
                self.ctx.session.lock().on_connect();
                let channel = self.ctx.config.room().channel.clone();
                tracing::info!(channel = %channel, "Connected, joining channel");
                self.emit(OutboundEvent::JoinChannel { name: channel }).await;
            }
            InboundEvent::ChannelOpts => {
                let should_login = self.ctx.session.lock().on_channel_options();
                if should_login {
                    let room = self.ctx.config.room();
                    self.emit(OutboundEvent::Login {
                        name: room.username.clone(),
                        password: room.password.clone(),
                    })
                    .await;
                }
            }
            InboundEvent::Login(login) => self.on_login(login).await,
            InboundEvent::UserList(users) => {
                tracing::debug!(users = users.len(), "Received user list");
                self.ctx.session.lock().on_roster_snapshot(users);
            }
            InboundEvent::AddUser(user) | InboundEvent::SetUserRank(user) => {
                self.ctx.session.lock().on_user_join_or_rank_change(user);
            }
            InboundEvent::UserLeave(user) => {
                self.ctx.session.lock().on_user_leave(&user.name);
            }
            InboundEvent::ChatMsg(chat) => self.on_chat(chat).await,
            InboundEvent::Queue => self.signal(QueueSignal::Ack),
            InboundEvent::QueueWarn(warn) => self.signal(QueueSignal::Warn { msg: warn.msg }),
            InboundEvent::QueueFail(fail) => self.signal(QueueSignal::Fail {
                msg: fail.msg,
                id: fail.id,
            }),
            InboundEvent::Disconnected { reason } => {
                tracing::info!(reason = %reason, "Disconnected from room");
                self.ctx.session.lock().on_disconnect();
                self.signal(QueueSignal::Aborted);
                return Some(if self.shutdown_requested {
                    SessionExit::Killed
                } else {
                    SessionExit::ConnectionLost
                });
            }
            InboundEvent::ConnectError { message } => self.on_connect_error(message),
        }
        None
    }

    async fn on_login(&mut self, login: LoginPayload) {
        if !login.success {
            tracing::error!(
                error = login.error.as_deref().unwrap_or("unknown"),
                "Login rejected"
            );
            return;
        }

        let ready = self.ctx.session.lock().on_authenticated(true);
        if ready {
            tracing::info!(name = login.name.as_deref().unwrap_or_default(), "Logged in");
            self.ctx.transport.say(messages::GREETING).await;
        }
    }

    async fn on_chat(&mut self, chat: ChatMsgPayload) {
        let Some(sent_at) = DateTime::<Utc>::from_timestamp_millis(chat.time) else {
            tracing::debug!(time = chat.time, "Chat message with invalid timestamp");
            return;
        };

        let decision = {
            let session = self.ctx.session.lock();
            self.dispatcher
                .evaluate(&session, &chat.username, &chat.msg, sent_at, Utc::now())
        };

        match decision {
            Decision::Ignore(reason) => {
                tracing::trace!(?reason, sender = %chat.username, "Ignoring chat message");
            }
            Decision::Reply(message) => self.ctx.transport.say(&message).await,
            Decision::Execute(Command::Help) => {
                self.ctx
                    .transport
                    .say(&messages::help(self.dispatcher.prefix()))
                    .await;
            }
            Decision::Execute(command) => self.start(command).await,
        }
    }

    async fn start(&mut self, command: Command) {
        let Some(guard) = self.ctx.session.try_begin_operation() else {
            self.ctx.transport.say(messages::BUSY).await;
            return;
        };

        let ctx = self.ctx.clone();
        let task = match command {
            Command::Content => tokio::spawn(handlers::run_content(ctx, guard)),
            Command::Random { pool_width } => {
                tokio::spawn(handlers::run_random(ctx, guard, pool_width))
            }
            Command::Kill => {
                self.shutdown_requested = true;
                tokio::spawn(handlers::run_kill(ctx, guard))
            }
            Command::Help => return,
        };
        self.in_flight = Some(task);
    }

    fn on_connect_error(&mut self, message: String) {
        let should_reconnect = self.ctx.session.lock().on_connect_error();
        if !should_reconnect || self.shutdown_requested {
            tracing::debug!(error = %message, "Ignoring connect error");
            return;
        }

        let delay = self.ctx.config.reconnect_delay;
        tracing::warn!(error = %message, delay_ms = delay.as_millis() as u64, "Connect error, rediscovering");

        // A newer connect error supersedes the attempt already scheduled
        if let Some(previous) = self.pending_reconnect.take() {
            previous.abort();
        }

        let transport = self.ctx.transport.clone();
        self.pending_reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = transport.reconnect().await {
                e.log();
            }
        }));
    }

    async fn emit(&self, event: OutboundEvent) {
        let name = event.name();
        if let Err(e) = self.ctx.transport.emit(event).await {
            tracing::warn!(event = name, error = %e, "Failed to emit event");
        }
    }

    fn signal(&self, signal: QueueSignal) {
        // The receiver lives in the shared context, so this only fails during teardown
        let _ = self.signals.send(signal);
    }
}
