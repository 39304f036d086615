//! Mailbox ingestion.
//!
//! Vendors reply to RFP invitations by email. A sync run connects to the
//! shared mailbox over IMAP, fetches recent messages without marking them
//! read, resolves each sender to the RFP they were invited to, and turns new
//! messages into proposals. Re-running a sync never duplicates a proposal.

pub mod client;
pub mod error;
pub mod extract;
pub mod mailbox;
pub mod parser;
pub mod reconcile;
pub mod sync;

pub use client::{ImapClient, ImapConnector};
pub use error::EmailError;
pub use extract::{extract_fields, ExtractedFields};
pub use mailbox::{FetchedMessage, InboxStats, MailboxConnector, MailboxSession};
pub use parser::{parse_message, InboundMail, MailAttachment};
pub use reconcile::{InboundProposal, Reconciler, Reconciliation};
pub use sync::{InboxSynchronizer, SyncSummary, SyncedEmail, SYNC_WINDOW_DAYS};
