//! One synchronization run over the proposal mailbox.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use tracing::{info_span, Instrument};

use crate::db::{rfp_repo, Database};
use crate::model::normalize_address;
use crate::sanitize::redact_address;

use super::error::Result;
use super::extract::extract_fields;
use super::mailbox::{FetchedMessage, InboxStats, MailboxConnector, MailboxSession};
use super::parser::parse_message;
use super::reconcile::{InboundProposal, Reconciler, Reconciliation};

/// Messages older than this many days are not fetched.
pub const SYNC_WINDOW_DAYS: i64 = 5;

/// A proposal created during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedEmail {
    pub from: String,
    pub subject: String,
    pub rfp_id: String,
}

/// Counters for one run.
///
/// `processed` counts messages that parsed; `errors` counts messages that
/// failed to parse or to persist. Messages skipped for lack of a sender or
/// a matching RFP count as processed only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub processed: u32,
    pub created: u32,
    pub errors: u32,
    pub emails: Vec<SyncedEmail>,
}

enum Outcome {
    Created(SyncedEmail),
    Touched,
    Skipped(&'static str),
}

pub struct InboxSynchronizer {
    connector: Arc<dyn MailboxConnector>,
    db: Database,
    reconciler: Reconciler,
}

impl InboxSynchronizer {
    pub fn new(connector: Arc<dyn MailboxConnector>, db: Database, reconciler: Reconciler) -> Self {
        Self {
            connector,
            db,
            reconciler,
        }
    }

    /// Fetches recent messages and turns new ones into proposals.
    ///
    /// Connection, search, and fetch failures abort the run. Per-message
    /// failures are counted and the run continues.
    pub async fn sync(&self) -> Result<SyncSummary> {
        let since = (Utc::now() - Duration::days(SYNC_WINDOW_DAYS)).date_naive();
        let span = info_span!("inbox_sync", folder = %self.connector.folder(), %since);
        self.sync_since(since).instrument(span).await
    }

    async fn sync_since(&self, since: NaiveDate) -> Result<SyncSummary> {
        let mut session = self.connector.connect().await?;
        let result = self.run(session.as_mut(), since).await;
        close(session.as_mut()).await;
        let summary = result?;

        info!(
            "Inbox sync finished: {} processed, {} created, {} errors",
            summary.processed, summary.created, summary.errors
        );
        Ok(summary)
    }

    async fn run(&self, session: &mut dyn MailboxSession, since: NaiveDate) -> Result<SyncSummary> {
        session.select(self.connector.folder()).await?;
        let uids = session.search_since(since).await?;
        info!("Found {} message(s) since {}", uids.len(), since);

        let messages = session.fetch(&uids).await?;
        let mut summary = SyncSummary::default();

        for message in messages {
            match self.process(&message).await {
                Ok(None) => summary.errors += 1,
                Ok(Some(outcome)) => {
                    summary.processed += 1;
                    match outcome {
                        Outcome::Created(email) => {
                            summary.created += 1;
                            summary.emails.push(email);
                        }
                        Outcome::Touched => {}
                        Outcome::Skipped(reason) => {
                            debug!("Skipped message uid={}: {}", message.uid, reason)
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to process message uid={}: {}", message.uid, e);
                    summary.processed += 1;
                    summary.errors += 1;
                }
            }
        }
        Ok(summary)
    }

    /// `Ok(None)` means the message did not parse.
    async fn process(&self, message: &FetchedMessage) -> Result<Option<Outcome>> {
        let mail = match parse_message(&message.raw) {
            Ok(mail) => mail,
            Err(e) => {
                warn!("Failed to parse message uid={}: {}", message.uid, e);
                return Ok(None);
            }
        };

        let Some(from) = mail.from_address.as_deref() else {
            return Ok(Some(Outcome::Skipped("no sender address")));
        };
        let vendor_email = normalize_address(from);

        let Some(rfp) = rfp_repo::find_latest_for_vendor(&self.db, &vendor_email)? else {
            debug!(
                "No RFP invites {}; ignoring message",
                redact_address(&vendor_email)
            );
            return Ok(Some(Outcome::Skipped("sender is not an invited vendor")));
        };

        let inbound = InboundProposal {
            rfp_id: &rfp.id,
            vendor_email: &vendor_email,
            seen: message.seen,
            mail: &mail,
            fields: extract_fields(&mail.text),
        };
        let subject = inbound.subject().to_string();

        let outcome = match self.reconciler.reconcile(inbound).await? {
            Reconciliation::Created(proposal) => {
                info!(
                    "Created proposal {} for RFP {} from {}",
                    proposal.id,
                    rfp.id,
                    redact_address(&vendor_email)
                );
                Outcome::Created(SyncedEmail {
                    from: vendor_email,
                    subject,
                    rfp_id: rfp.id,
                })
            }
            Reconciliation::FlagUpdated { .. } | Reconciliation::Unchanged { .. } => {
                Outcome::Touched
            }
        };
        Ok(Some(outcome))
    }

    /// Reads inbox counters without changing any flags.
    pub async fn stats(&self) -> Result<InboxStats> {
        let folder = self.connector.folder().to_string();
        async {
            let mut session = self.connector.connect().await?;
            let result = session.examine(&folder).await;
            close(session.as_mut()).await;
            result
        }
        .instrument(info_span!("inbox_stats", %folder))
        .await
    }
}

async fn close(session: &mut dyn MailboxSession) {
    if let Err(e) = session.logout().await {
        warn!("Mailbox logout failed: {}", e);
    }
}

