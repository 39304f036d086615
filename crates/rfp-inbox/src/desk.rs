//! Boundary operations consumed by the CLI and any other front end.
//!
//! A [`Desk`] owns the database, the content store, and the optional
//! collaborators (mailbox, reasoning provider, notifier). Missing
//! collaborators degrade the operations that need them and nothing else.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};

use crate::analysis::{
    analysis_queue, Analyzer, AnalysisQueue, AnalysisWorker, OpenAiCompatProvider,
    ReasoningProvider,
};
use crate::config::AppConfig;
use crate::db::{proposal_repo, rfp_repo, AcceptOutcome, Database, Transition};
use crate::email::{
    EmailError, ImapConnector, InboxStats, InboxSynchronizer, MailboxConnector, Reconciler,
    SyncSummary,
};
use crate::error::{Result, RfpError};
use crate::model::{
    NewRfp, NewVendorResponse, Rfp, RfpStatus, RfpSummary, VendorComparison, VendorResponse,
};
use crate::notify::{notifier_from_config, AcceptanceEvent, DisabledNotifier, Notifier, NotifyError};
use crate::sanitize::redact_address;
use crate::storage::{ContentStore, StoredContent};

/// Result of accepting a proposal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Acceptance {
    pub proposal: VendorResponse,
    pub rfp: Rfp,
    /// Whether the vendor notification went out.
    pub notified: bool,
}

/// A desk plus the background analysis consumer it feeds, if any.
pub struct Assembly {
    pub desk: Desk,
    pub analysis: Option<(AnalysisWorker, mpsc::Receiver<String>)>,
}

/// Upper bound on waiting for the vendor notification after an acceptance.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Desk {
    db: Database,
    store: ContentStore,
    analyzer: Analyzer,
    queue: Option<AnalysisQueue>,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
    mailbox: Option<Arc<dyn MailboxConnector>>,
}

fn applied<T>(kind: &'static str, id: &str, transition: Transition<T>) -> Result<T> {
    match transition {
        Transition::Applied(value) => Ok(value),
        Transition::NotFound => Err(RfpError::not_found(kind, id)),
        Transition::Refused(refusal) => Err(refusal.into()),
    }
}

impl Desk {
    /// A desk with no mailbox, no reasoning provider, and no notifier.
    pub fn new(db: Database, store: ContentStore) -> Self {
        Self {
            db,
            store,
            analyzer: Analyzer::default(),
            queue: None,
            notifier: Arc::new(DisabledNotifier),
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            mailbox: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Routes newly created proposals to a background analysis queue.
    pub fn with_queue(mut self, queue: AnalysisQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Caps how long `accept_proposal` waits on the notifier.
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub fn with_mailbox(mut self, mailbox: Arc<dyn MailboxConnector>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Wires every collaborator the configuration provides.
    pub fn from_config(config: &AppConfig) -> Result<Assembly> {
        let db = Database::open(&config.database_path())?;
        let store = ContentStore::new(config.attachments_dir());

        let mut desk = Desk::new(db.clone(), store)
            .with_notifier(notifier_from_config(&config.notification))
            .with_notify_timeout(Duration::from_secs(config.notification.timeout_secs.max(1)));

        if let Some(mailbox) = &config.mailbox {
            desk = desk.with_mailbox(Arc::new(ImapConnector::new(mailbox.clone())));
        }

        let analysis = match OpenAiCompatProvider::from_config(&config.analysis)? {
            Some(provider) => {
                let provider: Arc<dyn ReasoningProvider> = Arc::new(provider);
                let analyzer = Analyzer::new(Some(provider));
                let (queue, rx) = analysis_queue(config.analysis.queue_capacity);
                desk = desk.with_analyzer(analyzer.clone()).with_queue(queue);
                let worker = AnalysisWorker::new(db, analyzer, config.analysis.max_concurrent);
                Some((worker, rx))
            }
            None => {
                info!("No analysis API key configured; proposals will not be scored");
                None
            }
        };

        Ok(Assembly { desk, analysis })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn analysis_queue(&self) -> Option<&AnalysisQueue> {
        self.queue.as_ref()
    }

    fn synchronizer(&self) -> Result<InboxSynchronizer> {
        let mailbox = self.mailbox.clone().ok_or_else(|| {
            EmailError::ConfigError("no mailbox is configured".to_string())
        })?;
        let reconciler = Reconciler::new(self.db.clone(), self.store.clone(), self.queue.clone());
        Ok(InboxSynchronizer::new(mailbox, self.db.clone(), reconciler))
    }

    /// Runs one inbox synchronization.
    pub async fn sync_inbox(&self) -> Result<SyncSummary> {
        Ok(self.synchronizer()?.sync().await?)
    }

    /// Reads inbox counters without changing flags.
    pub async fn inbox_stats(&self) -> Result<InboxStats> {
        Ok(self.synchronizer()?.stats().await?)
    }

    pub fn create_rfp(&self, new: NewRfp) -> Result<Rfp> {
        if new.company_name.trim().is_empty() {
            return Err(RfpError::Validation("companyName is required".to_string()));
        }
        if new.project_title.trim().is_empty() {
            return Err(RfpError::Validation("projectTitle is required".to_string()));
        }
        if !new.budget.is_finite() || new.budget < 0.0 {
            return Err(RfpError::Validation(
                "budget must be a non-negative number".to_string(),
            ));
        }

        let rfp = Rfp::from_new(new);
        rfp_repo::insert(&self.db, &rfp)?;
        info!(
            rfp_id = %rfp.id,
            invited = rfp.invited_vendors.len(),
            "RFP created"
        );
        Ok(rfp)
    }

    pub fn list_rfps(&self) -> Result<Vec<RfpSummary>> {
        Ok(rfp_repo::list_with_counts(&self.db)?)
    }

    pub fn get_rfp(&self, id: &str) -> Result<Rfp> {
        rfp_repo::find_by_id(&self.db, id)?.ok_or_else(|| RfpError::not_found("RFP", id))
    }

    pub fn close_rfp(&self, id: &str) -> Result<Rfp> {
        let rfp = applied("RFP", id, rfp_repo::transition(&self.db, id, RfpStatus::close)?)?;
        info!(rfp_id = %id, "RFP closed");
        Ok(rfp)
    }

    /// Records a proposal submitted through the web form and queues it for analysis.
    pub fn submit_proposal(&self, mut new: NewVendorResponse) -> Result<VendorResponse> {
        if new.vendor_email.trim().is_empty() {
            return Err(RfpError::Validation("vendorEmail is required".to_string()));
        }
        if new.vendor_name.trim().is_empty() {
            return Err(RfpError::Validation("vendorName is required".to_string()));
        }
        let rfp = self.get_rfp(&new.rfp_id)?;
        if !rfp.accepts_vendor(&new.vendor_email) {
            return Err(RfpError::NotInvited {
                vendor: new.vendor_email.trim().to_lowercase(),
            });
        }

        new.email = None;
        let proposal = VendorResponse::from_new(new);
        proposal_repo::insert(&self.db, &proposal)?;
        info!(
            proposal_id = %proposal.id,
            rfp_id = %rfp.id,
            vendor = %redact_address(&proposal.vendor_email),
            "proposal submitted"
        );

        if let Some(queue) = &self.queue {
            queue.enqueue(&proposal.id);
        }
        Ok(proposal)
    }

    /// All proposals, or those of one RFP, newest first.
    pub fn list_proposals(&self, rfp_id: Option<&str>) -> Result<Vec<VendorResponse>> {
        Ok(match rfp_id {
            Some(rfp_id) => proposal_repo::list_for_rfp(&self.db, rfp_id)?,
            None => proposal_repo::list_all(&self.db)?,
        })
    }

    pub fn get_proposal(&self, id: &str) -> Result<VendorResponse> {
        proposal_repo::find_by_id(&self.db, id)?.ok_or_else(|| RfpError::not_found("proposal", id))
    }

    /// Analyzes a proposal now and stores the result.
    pub async fn analyze_proposal(&self, id: &str) -> Result<VendorResponse> {
        let proposal = self.get_proposal(id)?;
        let rfp = self.get_rfp(&proposal.rfp_id)?;

        let analysis = self.analyzer.analyze(&rfp, &proposal).await?;
        proposal_repo::record_analysis(&self.db, id, &analysis, Utc::now())?
            .ok_or_else(|| RfpError::not_found("proposal", id))
    }

    /// Ranks the analyzed proposals of an RFP.
    pub async fn compare_rfp(&self, rfp_id: &str) -> Result<VendorComparison> {
        let rfp = self.get_rfp(rfp_id)?;
        let analyzed = proposal_repo::list_analyzed_for_rfp(&self.db, rfp_id)?;
        Ok(self.analyzer.compare(&rfp, &analyzed).await?)
    }

    /// Accepts a proposal, moves its RFP to accepted, and notifies the vendor.
    ///
    /// The acceptance is committed before the notifier runs. The notifier is
    /// given at most the configured notify timeout; a failed, unavailable, or
    /// timed-out notification is logged and reported as `notified: false`.
    pub async fn accept_proposal(&self, id: &str) -> Result<Acceptance> {
        let (proposal, rfp) = match proposal_repo::accept(&self.db, id)? {
            AcceptOutcome::Accepted { proposal, rfp } => (proposal, rfp),
            AcceptOutcome::ProposalNotFound => return Err(RfpError::not_found("proposal", id)),
            AcceptOutcome::RfpNotFound => {
                return Err(RfpError::not_found("RFP of proposal", id))
            }
            AcceptOutcome::Refused(refusal) => return Err(refusal.into()),
        };

        let span = info_span!("accept_proposal", proposal_id = %proposal.id, rfp_id = %rfp.id);
        let notified = async {
            info!("proposal accepted");
            let event = AcceptanceEvent::new(&proposal, &rfp);
            let sent =
                tokio::time::timeout(self.notify_timeout, self.notifier.proposal_accepted(&event))
                    .await;
            match sent {
                Ok(Ok(())) => true,
                Ok(Err(NotifyError::Unavailable)) => {
                    warn!("vendor not notified: {}", NotifyError::Unavailable);
                    false
                }
                Ok(Err(e)) => {
                    warn!("vendor notification failed: {}", e);
                    false
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.notify_timeout.as_millis() as u64,
                        "vendor notification timed out"
                    );
                    false
                }
            }
        }
        .instrument(span)
        .await;

        Ok(Acceptance {
            proposal,
            rfp,
            notified,
        })
    }

    pub fn reject_proposal(&self, id: &str) -> Result<VendorResponse> {
        let step = |status: crate::model::ProposalStatus| status.reject();
        let proposal = applied("proposal", id, proposal_repo::transition(&self.db, id, step)?)?;
        info!(proposal_id = %id, "proposal rejected");
        Ok(proposal)
    }

    /// Opens a stored attachment by key, confined to the content store.
    pub async fn open_attachment(&self, key: &str) -> Result<StoredContent> {
        Ok(self.store.open(key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProposalStatus;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn desk() -> (TempDir, Desk) {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let desk = Desk::new(db, ContentStore::new(dir.path().join("attachments")));
        (dir, desk)
    }

    fn new_rfp(vendors: &[&str]) -> NewRfp {
        NewRfp {
            company_name: "Acme".to_string(),
            contact_person: "Ann".to_string(),
            contact_email: None,
            phone: None,
            project_title: "Website".to_string(),
            project_description: "Rebuild".to_string(),
            budget: 20_000.0,
            deadline: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            requirements: "Reqs".to_string(),
            invited_vendors: vendors.iter().map(|v| v.to_string()).collect(),
            attachments: vec![],
        }
    }

    fn submission(rfp_id: &str, vendor: &str) -> NewVendorResponse {
        NewVendorResponse {
            rfp_id: rfp_id.to_string(),
            vendor_email: vendor.to_string(),
            vendor_name: "Vendor".to_string(),
            proposed_price: Some(15_000.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_rfp_validates() {
        let (_dir, desk) = desk();
        let mut bad = new_rfp(&[]);
        bad.budget = -1.0;
        assert_eq!(desk.create_rfp(bad).unwrap_err().status_code(), 400);

        let rfp = desk.create_rfp(new_rfp(&[" A@X.com", "a@x.com"])).unwrap();
        assert_eq!(rfp.invited_vendors, vec!["a@x.com"]);
        assert_eq!(desk.list_rfps().unwrap().len(), 1);
    }

    #[test]
    fn test_submit_requires_invitation() {
        let (_dir, desk) = desk();
        let rfp = desk.create_rfp(new_rfp(&["a@x.com"])).unwrap();

        let err = desk.submit_proposal(submission(&rfp.id, "c@x.com")).unwrap_err();
        assert!(matches!(err, RfpError::NotInvited { .. }));
        assert_eq!(err.status_code(), 403);

        let proposal = desk.submit_proposal(submission(&rfp.id, "A@X.COM")).unwrap();
        assert_eq!(proposal.vendor_email, "a@x.com");
        assert!(proposal.email.is_none());

        let missing = desk.submit_proposal(submission("nope", "a@x.com")).unwrap_err();
        assert_eq!(missing.status_code(), 404);
    }

    #[test]
    fn test_open_rfp_accepts_anyone() {
        let (_dir, desk) = desk();
        let rfp = desk.create_rfp(new_rfp(&[])).unwrap();
        assert!(desk.submit_proposal(submission(&rfp.id, "z@y.com")).is_ok());
    }

    #[tokio::test]
    async fn test_accept_cascades_and_blocks_second_acceptance() {
        let (_dir, desk) = desk();
        let rfp = desk.create_rfp(new_rfp(&[])).unwrap();
        let first = desk.submit_proposal(submission(&rfp.id, "a@x.com")).unwrap();
        let second = desk.submit_proposal(submission(&rfp.id, "b@x.com")).unwrap();

        let acceptance = desk.accept_proposal(&first.id).await.unwrap();
        assert_eq!(acceptance.proposal.status, ProposalStatus::Accepted);
        assert_eq!(acceptance.rfp.status, RfpStatus::Accepted);
        assert!(!acceptance.notified);

        let err = desk.accept_proposal(&second.id).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(desk.get_proposal(&second.id).unwrap().status, ProposalStatus::Pending);
    }

    #[tokio::test]
    async fn test_reject_then_accept_is_refused() {
        let (_dir, desk) = desk();
        let rfp = desk.create_rfp(new_rfp(&[])).unwrap();
        let proposal = desk.submit_proposal(submission(&rfp.id, "a@x.com")).unwrap();

        let rejected = desk.reject_proposal(&proposal.id).unwrap();
        assert_eq!(rejected.status, ProposalStatus::Rejected);
        assert!(matches!(
            desk.accept_proposal(&proposal.id).await.unwrap_err(),
            RfpError::Transition(_)
        ));
        assert_eq!(desk.get_rfp(&rfp.id).unwrap().status, RfpStatus::Pending);
    }

    #[test]
    fn test_close_rfp() {
        let (_dir, desk) = desk();
        let rfp = desk.create_rfp(new_rfp(&[])).unwrap();
        assert_eq!(desk.close_rfp(&rfp.id).unwrap().status, RfpStatus::Closed);
        assert_eq!(desk.close_rfp("missing").unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn test_sync_without_mailbox_is_unavailable() {
        let (_dir, desk) = desk();
        let err = desk.sync_inbox().await.unwrap_err();
        assert!(matches!(err, RfpError::Email(EmailError::ConfigError(_))));
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_analysis_without_provider_is_unavailable() {
        let (_dir, desk) = desk();
        let rfp = desk.create_rfp(new_rfp(&[])).unwrap();
        let proposal = desk.submit_proposal(submission(&rfp.id, "a@x.com")).unwrap();

        let err = desk.analyze_proposal(&proposal.id).await.unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert_eq!(desk.get_proposal(&proposal.id).unwrap().status, ProposalStatus::Pending);

        let err = desk.compare_rfp(&rfp.id).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
