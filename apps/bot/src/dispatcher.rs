//! Command parsing and gating
//!
//! The dispatcher turns a chat line into a [`Decision`]: ignore it, answer
//! it directly, or run a command. Gates apply in a fixed order: staleness,
//! recognition, rank, busy-lock, readiness.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tubebot_youtube_client::{MAX_POOL_WIDTH, MIN_POOL_WIDTH};

use crate::config::BotConfig;
use crate::messages;
use crate::protocol::Rank;
use crate::session::{Session, SessionState};

const RECOGNIZED: [&str; 4] = ["content", "random", "help", "kill"];

/// A recognized, authorized command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Content,
    Random { pool_width: u32 },
    Help,
    Kill,
}

/// Why a chat line was dropped without a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Stale,
    NotACommand,
    NotReady,
}

/// Outcome of evaluating one chat line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Ignore(IgnoreReason),
    Reply(String),
    Execute(Command),
}

/// Split a chat line into a lowercased command name and arguments
///
/// Returns `None` when the line does not start with `prefix`.
pub fn tokenize(prefix: &str, raw: &str) -> Option<(String, Vec<String>)> {
    let mut tokens = raw.split_whitespace().map(str::to_lowercase);
    let first = tokens.next()?;
    let name = first.strip_prefix(prefix)?.to_string();
    Some((name, tokens.collect()))
}

/// Parse the optional pool width argument of `random`
pub fn parse_pool_width(arg: Option<&str>, default: u32) -> u32 {
    match arg.map(str::parse::<i64>) {
        Some(Ok(width)) => {
            width.clamp(i64::from(MIN_POOL_WIDTH), i64::from(MAX_POOL_WIDTH)) as u32
        }
        _ => default,
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    prefix: String,
    min_rank: Rank,
    staleness: Duration,
    default_pool_width: u32,
}

impl Dispatcher {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            prefix: config.command_prefix.clone(),
            min_rank: config.min_rank,
            staleness: config.staleness,
            default_pool_width: config.default_pool_width,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Evaluate a chat line against the current session
    pub fn evaluate(
        &self,
        session: &Session,
        sender: &str,
        raw: &str,
        sent_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Decision {
        if self.is_stale(sent_at, now) {
            return Decision::Ignore(IgnoreReason::Stale);
        }

        let Some((name, args)) = tokenize(&self.prefix, raw) else {
            return Decision::Ignore(IgnoreReason::NotACommand);
        };
        if !RECOGNIZED.contains(&name.as_str()) {
            return Decision::Ignore(IgnoreReason::NotACommand);
        }

        if session.current_user_rank(sender) < self.min_rank {
            tracing::info!(sender, command = %name, "Rejected command from low-rank user");
            return Decision::Reply(messages::PERMISSION_DENIED.to_string());
        }

        if session.is_busy() {
            return Decision::Reply(messages::BUSY.to_string());
        }

        if session.state() != SessionState::Idle {
            return Decision::Ignore(IgnoreReason::NotReady);
        }

        match self.command(&name, &args) {
            Some(command) => {
                tracing::info!(sender, ?command, "Dispatching command");
                Decision::Execute(command)
            }
            None => Decision::Reply(messages::missing_case(raw)),
        }
    }

    fn is_stale(&self, sent_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match (now - sent_at).to_std() {
            Ok(age) => age > self.staleness,
            // Timestamps from the future are not stale
            Err(_) => false,
        }
    }

    fn command(&self, name: &str, args: &[String]) -> Option<Command> {
        match name {
            "content" => Some(Command::Content),
            "random" => Some(Command::Random {
                pool_width: parse_pool_width(
                    args.first().map(String::as_str),
                    self.default_pool_width,
                ),
            }),
            "help" => Some(Command::Help),
            "kill" => Some(Command::Kill),
            _ => None,
        }
    }
}
