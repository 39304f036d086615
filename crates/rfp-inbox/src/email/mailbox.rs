//! Mailbox capability used by the synchronizer.
//!
//! The synchronizer only needs to open a session, select or examine a
//! folder, search by date, and fetch raw messages with their seen flag.
//! Keeping that behind a trait lets the pipeline run against the live IMAP
//! client or an in-memory mailbox.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use super::error::Result;

/// Counters reported by a read-only examine of the inbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InboxStats {
    pub total: u32,
    pub new: u32,
    pub unseen: u32,
}

/// One message as fetched from the server.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub uid: u32,
    /// Whether the `\Seen` flag was set when fetched.
    pub seen: bool,
    pub raw: Vec<u8>,
}

/// An authenticated mailbox session.
#[async_trait]
pub trait MailboxSession: Send {
    /// Opens a folder read-write.
    async fn select(&mut self, folder: &str) -> Result<()>;

    /// Opens a folder read-only and reports its counters.
    async fn examine(&mut self, folder: &str) -> Result<InboxStats>;

    /// UIDs of messages received on or after `since`, ascending.
    async fn search_since(&mut self, since: NaiveDate) -> Result<Vec<u32>>;

    /// Fetches raw messages without setting `\Seen`, in server order.
    async fn fetch(&mut self, uids: &[u32]) -> Result<Vec<FetchedMessage>>;

    async fn logout(&mut self) -> Result<()>;
}

/// Opens sessions against one configured mailbox.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn MailboxSession>>;

    /// The folder proposals arrive in.
    fn folder(&self) -> &str;
}
