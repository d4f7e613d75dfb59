//! Notification sources.
//!
//! A source is anything that can enumerate the messages received since a given time and hand back the raw bytes of
//! one of them. The engine never talks to a mail server directly; it only depends on [`NotificationSource`].
//!
//! Two adapters are provided:
//! * [`MaildirSource`] reads `*.eml` files from a directory. Any mail retriever (fetchmail, offlineimap, a cron job
//!   exporting from a web mailbox) can fill that directory.
//! * [`MemorySource`] keeps messages in memory and can simulate outages and unreadable messages.
use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

mod maildir;
mod memory;
mod raw_notification;

pub use maildir::MaildirSource;
pub use memory::MemorySource;
pub use raw_notification::{RawNotification, MAX_BODY_CHARS};

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The source could not be reached at all. The current scan is abandoned.
    #[error("The notification source is unavailable. {0}")]
    Unavailable(String),
    #[error("Message {0} does not exist in the notification source")]
    MessageNotFound(String),
    #[error("Could not decode message. {0}")]
    Decode(String),
    #[error("I/O error reading from the notification source. {0}")]
    Io(String),
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Io(e.to_string())
    }
}

/// The contract for an inbox of payment notifications.
///
/// Message ids must be stable: the same message must always be reported under the same id, since the id is the
/// deduplication key for the whole pipeline.
pub trait NotificationSource: Send + Sync + 'static {
    /// Lists the ids of all messages received at or after `since`. The order is not significant.
    fn search_since(&self, since: DateTime<Utc>) -> impl Future<Output = Result<Vec<String>, SourceError>> + Send;

    /// Fetches the raw RFC 822 bytes of the message with the given id.
    fn fetch(&self, id: &str) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;
}
