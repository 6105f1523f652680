//! Chat messages the bot sends to the room

use std::time::Duration;

pub const GREETING: &str = "Hello!";
pub const PERMISSION_DENIED: &str = "You don't have permission to do that.";
pub const BUSY: &str = "Currently collecting content, please wait...";
pub const SEARCHING: &str = "Searching for content...";
pub const NO_CONTENT: &str = "No content to add.";
pub const CONTENT_DONE: &str = "Finished adding content.";
pub const RANDOM_NONE: &str = "Found no random videos.. Try again. If giving arg over 5, try reducing.";
pub const RANDOM_LOOKUP_FAILED: &str = "Random search failed, try again later.";
pub const FAREWELL: &str = "Bye bye!";

pub fn help(prefix: &str) -> String {
    format!(
        "Commands: {p}content (add new uploads from tracked channels), \
         {p}random [n] (add one random video, n = query length 1-10, default 3), \
         {p}help (this message), {p}kill (disconnect the bot)",
        p = prefix
    )
}

pub fn adding(count: usize) -> String {
    format!("Adding {} videos.", count)
}

/// Retry notice; partial seconds round up
pub fn retrying(id: &str, delay: Duration) -> String {
    let secs = delay.as_millis().div_ceil(1000);
    format!("Failed to add {}, retrying in {} secs.", id, secs)
}

pub fn giving_up(id: &str, attempts: u32) -> String {
    format!("Giving up on {} after {} attempts.", id, attempts)
}

pub fn random_added(id: &str) -> String {
    format!("Added random vid: {}", id)
}

pub fn random_rejected(id: &str) -> String {
    format!("Could not add random vid: {}", id)
}

pub fn missing_case(raw: &str) -> String {
    format!("Missing case for command {}", raw)
}
