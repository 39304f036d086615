#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use rfp_inbox::analysis::{ProviderError, ReasoningProvider};
use rfp_inbox::email::error::{EmailError, Result as EmailResult};
use rfp_inbox::email::{FetchedMessage, InboxStats, MailboxConnector, MailboxSession};
use rfp_inbox::model::{NewRfp, Rfp};
use rfp_inbox::notify::{AcceptanceEvent, Notifier, NotifyError};
use rfp_inbox::{ContentStore, Database, Desk};

/// Temp directory, in-memory database, and content store for one test.
pub struct TestHarness {
    pub dir: TempDir,
    pub db: Database,
    pub store: ContentStore,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let store = ContentStore::new(dir.path().join("attachments"));
        Self { dir, db, store }
    }

    pub fn desk(&self) -> Desk {
        Desk::new(self.db.clone(), self.store.clone())
    }

    pub fn create_rfp(&self, title: &str, vendors: &[&str]) -> Rfp {
        self.desk().create_rfp(new_rfp(title, vendors)).unwrap()
    }
}

pub fn new_rfp(title: &str, vendors: &[&str]) -> NewRfp {
    NewRfp {
        company_name: "Acme Corp".to_string(),
        contact_person: "Ann Example".to_string(),
        contact_email: Some("ann@acme.test".to_string()),
        phone: None,
        project_title: title.to_string(),
        project_description: "Rebuild the public website".to_string(),
        budget: 50_000.0,
        deadline: NaiveDate::from_ymd_opt(2026, 12, 15).unwrap(),
        requirements: "Responsive design, CMS, accessibility audit".to_string(),
        invited_vendors: vendors.iter().map(|v| v.to_string()).collect(),
        attachments: vec![],
    }
}

/// A plain-text RFC 822 message.
pub fn rfc822(from: &str, subject: &str, body: &str) -> Vec<u8> {
    format!(
        "From: {from}\r\n\
         To: rfp@acme.test\r\n\
         Subject: {subject}\r\n\
         Date: Fri, 16 Oct 2026 09:30:00 +0000\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         {body}\r\n"
    )
    .into_bytes()
}

/// A multipart message with one base64 attachment.
pub fn rfc822_with_attachment(
    from: &str,
    subject: &str,
    body: &str,
    filename: &str,
    base64_content: &str,
) -> Vec<u8> {
    format!(
        "From: {from}\r\n\
         Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"BOUNDARY\"\r\n\
         \r\n\
         --BOUNDARY\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         {body}\r\n\
         --BOUNDARY\r\n\
         Content-Type: application/pdf; name=\"{filename}\"\r\n\
         Content-Disposition: attachment; filename=\"{filename}\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {base64_content}\r\n\
         --BOUNDARY--\r\n"
    )
    .into_bytes()
}

#[derive(Default)]
pub struct MailboxState {
    pub messages: Vec<FetchedMessage>,
    pub fail_fetch: bool,
    pub connects: usize,
    pub logouts: usize,
    pub selected: Vec<String>,
    pub examined: Vec<String>,
}

/// In-memory mailbox whose contents tests can change between runs.
#[derive(Clone, Default)]
pub struct ScriptedMailbox {
    pub state: Arc<Mutex<MailboxState>>,
}

impl ScriptedMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&self, raw: Vec<u8>, seen: bool) -> u32 {
        let mut state = self.state.lock().unwrap();
        let uid = state.messages.len() as u32 + 1;
        state.messages.push(FetchedMessage { uid, seen, raw });
        uid
    }

    pub fn mark_seen(&self, uid: u32) {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.messages.iter_mut().find(|m| m.uid == uid) {
            message.seen = true;
        }
    }

    pub fn fail_fetch(&self) {
        self.state.lock().unwrap().fail_fetch = true;
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn logouts(&self) -> usize {
        self.state.lock().unwrap().logouts
    }
}

struct ScriptedSession {
    state: Arc<Mutex<MailboxState>>,
}

#[async_trait]
impl MailboxSession for ScriptedSession {
    async fn select(&mut self, folder: &str) -> EmailResult<()> {
        self.state.lock().unwrap().selected.push(folder.to_string());
        Ok(())
    }

    async fn examine(&mut self, folder: &str) -> EmailResult<InboxStats> {
        let mut state = self.state.lock().unwrap();
        state.examined.push(folder.to_string());
        let total = state.messages.len() as u32;
        let unseen = state.messages.iter().filter(|m| !m.seen).count() as u32;
        Ok(InboxStats {
            total,
            new: 0,
            unseen,
        })
    }

    async fn search_since(&mut self, _since: NaiveDate) -> EmailResult<Vec<u32>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .messages
            .iter()
            .map(|m| m.uid)
            .collect())
    }

    async fn fetch(&mut self, uids: &[u32]) -> EmailResult<Vec<FetchedMessage>> {
        let state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(EmailError::ProtocolError("connection reset".to_string()));
        }
        Ok(state
            .messages
            .iter()
            .filter(|m| uids.contains(&m.uid))
            .cloned()
            .collect())
    }

    async fn logout(&mut self) -> EmailResult<()> {
        self.state.lock().unwrap().logouts += 1;
        Ok(())
    }
}

#[async_trait]
impl MailboxConnector for ScriptedMailbox {
    async fn connect(&self) -> EmailResult<Box<dyn MailboxSession>> {
        self.state.lock().unwrap().connects += 1;
        Ok(Box::new(ScriptedSession {
            state: Arc::clone(&self.state),
        }))
    }

    fn folder(&self) -> &str {
        "INBOX"
    }
}

/// Reasoning provider that answers from a script, in order.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<String>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.iter().map(|r| r.to_string()).collect())),
            prompts: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete_json(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(user.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::RequestFailed("script exhausted".to_string()))
    }
}

pub fn analysis_reply(score: u8, recommendation: &str) -> String {
    serde_json::json!({
        "score": score,
        "recommendation": recommendation,
        "strengths": ["Competitive pricing", "Relevant experience"],
        "weaknesses": ["Tight schedule", "Few references"],
        "budgetAnalysis": "Within budget.",
        "timelineAnalysis": "Meets the deadline.",
        "riskAssessment": "Medium risk overall.",
        "keyInsights": "A credible proposal.",
        "structuredDetails": {
            "coreCompetencies": ["Web development"],
            "deliverables": ["Website"],
            "specialTerms": "",
            "uniqueSellingPoints": ["In-house design"]
        }
    })
    .to_string()
}

/// Notifier that records every event it is given.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub events: Arc<Mutex<Vec<AcceptanceEvent>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn proposal_accepted(&self, event: &AcceptanceEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Notifier whose transport always errors.
#[derive(Clone, Default)]
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn proposal_accepted(&self, _event: &AcceptanceEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Failed("webhook returned 500".to_string()))
    }
}

/// Notifier that never completes.
#[derive(Clone, Default)]
pub struct StalledNotifier;

#[async_trait]
impl Notifier for StalledNotifier {
    async fn proposal_accepted(&self, _event: &AcceptanceEvent) -> Result<(), NotifyError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}
