//! Bot API integration: wire types, client, and the update poller

pub mod client;
pub mod poller;
pub mod types;

pub use client::{TelegramClient, TelegramError};
pub use poller::{PollerGaveUp, UpdatePoller};
