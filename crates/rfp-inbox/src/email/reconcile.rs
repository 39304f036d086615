//! Create-versus-update decisions for mailbox-sourced proposals.
//!
//! The dedup key `(rfp, vendor address, subject)` decides the branch. An
//! existing record only has its read flag brought up to date; a new key
//! stores the attachments, inserts the record, and queues it for analysis.

use log::{debug, error, warn};

use crate::analysis::AnalysisQueue;
use crate::db::{proposal_repo, Database, DatabaseError};
use crate::model::{Attachment, DedupKey, EmailMetadata, NewVendorResponse, VendorResponse};
use crate::sanitize::redact_address;
use crate::storage::ContentStore;

use super::extract::{truncate_chars, ExtractedFields};
use super::parser::InboundMail;

/// Characters of HTML body kept on the record.
pub const HTML_LIMIT: usize = 5000;

/// A resolved inbound message ready for reconciliation.
#[derive(Debug)]
pub struct InboundProposal<'a> {
    pub rfp_id: &'a str,
    /// Normalized sender address.
    pub vendor_email: &'a str,
    pub seen: bool,
    pub mail: &'a InboundMail,
    pub fields: ExtractedFields,
}

impl InboundProposal<'_> {
    /// Subject used in the dedup key; a missing subject is the empty string.
    pub fn subject(&self) -> &str {
        self.mail.subject.as_deref().unwrap_or("")
    }

    fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.rfp_id, self.vendor_email, self.subject())
    }
}

/// What the reconciler did with one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Created(Box<VendorResponse>),
    FlagUpdated { id: String, is_read: bool },
    Unchanged { id: String },
}

pub struct Reconciler {
    db: Database,
    store: ContentStore,
    analysis: Option<AnalysisQueue>,
}

impl Reconciler {
    pub fn new(db: Database, store: ContentStore, analysis: Option<AnalysisQueue>) -> Self {
        Self {
            db,
            store,
            analysis,
        }
    }

    pub async fn reconcile(
        &self,
        inbound: InboundProposal<'_>,
    ) -> Result<Reconciliation, DatabaseError> {
        let key = inbound.dedup_key();

        if let Some(existing) = proposal_repo::find_by_dedup_key(&self.db, &key)? {
            return self.update_flag(existing, inbound.seen);
        }

        let attachments = self.persist_attachments(inbound.mail).await;
        let proposal = VendorResponse::from_new(build_new_response(&inbound, attachments));

        if !proposal_repo::insert_if_absent(&self.db, &proposal)? {
            // Another run created the same key between lookup and insert.
            if !proposal.attachments.is_empty() {
                warn!(
                    "Concurrent sync created proposal first; {} stored attachment(s) are orphaned: {:?}",
                    proposal.attachments.len(),
                    proposal
                        .attachments
                        .iter()
                        .map(|a| a.key.as_str())
                        .collect::<Vec<_>>()
                );
            }
            return match proposal_repo::find_by_dedup_key(&self.db, &key)? {
                Some(existing) => self.update_flag(existing, inbound.seen),
                None => Err(DatabaseError::Corrupt {
                    column: "vendor_responses.email_subject",
                    reason: "dedup conflict without a matching record".to_string(),
                }),
            };
        }

        debug!(
            "Created proposal {} from {}",
            proposal.id,
            redact_address(&proposal.vendor_email)
        );
        if let Some(queue) = &self.analysis {
            queue.enqueue(&proposal.id);
        }
        Ok(Reconciliation::Created(Box::new(proposal)))
    }

    fn update_flag(
        &self,
        existing: VendorResponse,
        seen: bool,
    ) -> Result<Reconciliation, DatabaseError> {
        let stored = existing.email.as_ref().map(|m| m.is_read).unwrap_or(false);
        if stored == seen {
            return Ok(Reconciliation::Unchanged { id: existing.id });
        }
        proposal_repo::set_is_read(&self.db, &existing.id, seen)?;
        debug!("Updated read flag of proposal {} to {}", existing.id, seen);
        Ok(Reconciliation::FlagUpdated {
            id: existing.id,
            is_read: seen,
        })
    }

    /// Stores each attachment; a failed write is logged and skipped.
    async fn persist_attachments(&self, mail: &InboundMail) -> Vec<Attachment> {
        let mut stored = Vec::with_capacity(mail.attachments.len());
        for attachment in &mail.attachments {
            match self
                .store
                .put(&attachment.filename, &attachment.media_type, &attachment.content)
                .await
            {
                Ok(descriptor) => stored.push(descriptor),
                Err(e) => error!(
                    "Failed to save attachment '{}': {}",
                    attachment.filename, e
                ),
            }
        }
        stored
    }
}

fn build_new_response(inbound: &InboundProposal<'_>, attachments: Vec<Attachment>) -> NewVendorResponse {
    let mail = inbound.mail;
    let subject = inbound.subject().to_string();
    NewVendorResponse {
        rfp_id: inbound.rfp_id.to_string(),
        vendor_email: inbound.vendor_email.to_string(),
        vendor_name: mail
            .from_name
            .clone()
            .unwrap_or_else(|| inbound.vendor_email.to_string()),
        proposed_price: inbound.fields.proposed_price,
        timeline: inbound.fields.timeline.clone(),
        experience: inbound.fields.experience.clone(),
        approach: inbound.fields.approach.clone(),
        team_size: inbound.fields.team_size,
        previous_work: None,
        notes: Some(format!("Email received: {}", subject)),
        email: Some(EmailMetadata {
            subject,
            body: mail.text.clone(),
            html: mail.html.as_deref().map(|h| truncate_chars(h, HTML_LIMIT)),
            received_at: mail.date,
            is_read: inbound.seen,
        }),
        attachments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::rfp_repo;
    use crate::email::extract::extract_fields;
    use crate::email::parser::MailAttachment;
    use crate::model::{NewRfp, Rfp};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Database, Reconciler, Rfp) {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let rfp = Rfp::from_new(NewRfp {
            company_name: "Acme".to_string(),
            contact_person: "Ann".to_string(),
            contact_email: None,
            phone: None,
            project_title: "Site".to_string(),
            project_description: "Build".to_string(),
            budget: 10_000.0,
            deadline: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            requirements: "Reqs".to_string(),
            invited_vendors: vec!["a@x.com".to_string()],
            attachments: vec![],
        });
        rfp_repo::insert(&db, &rfp).unwrap();
        let reconciler = Reconciler::new(
            db.clone(),
            ContentStore::new(dir.path().join("attachments")),
            None,
        );
        (dir, db, reconciler, rfp)
    }

    fn mail(subject: Option<&str>, html: Option<String>) -> InboundMail {
        InboundMail {
            message_id: None,
            subject: subject.map(|s| s.to_string()),
            from_address: Some("A@X.com".to_string()),
            from_name: Some("Vendor A".to_string()),
            date: None,
            text: "Proposed price: $12,500\nTimeline: 6 weeks".to_string(),
            html,
            attachments: vec![MailAttachment {
                filename: "quote.pdf".to_string(),
                media_type: "application/pdf".to_string(),
                content: b"%PDF".to_vec(),
            }],
        }
    }

    fn inbound<'a>(rfp: &'a Rfp, mail: &'a InboundMail, seen: bool) -> InboundProposal<'a> {
        InboundProposal {
            rfp_id: &rfp.id,
            vendor_email: "a@x.com",
            seen,
            mail,
            fields: extract_fields(&mail.text),
        }
    }

    #[tokio::test]
    async fn test_new_key_creates_proposal() {
        let (_dir, db, reconciler, rfp) = setup();
        let mail = mail(Some("Proposal"), Some("<p>x</p>".repeat(2000)));

        let outcome = reconciler.reconcile(inbound(&rfp, &mail, false)).await.unwrap();
        let Reconciliation::Created(proposal) = outcome else {
            panic!("expected creation, got {:?}", outcome);
        };
        assert_eq!(proposal.vendor_name, "Vendor A");
        assert_eq!(proposal.proposed_price, Some(12500.0));
        assert_eq!(proposal.timeline.as_deref(), Some("6 weeks"));
        assert_eq!(proposal.notes.as_deref(), Some("Email received: Proposal"));
        assert_eq!(proposal.attachments.len(), 1);
        let email = proposal.email.as_ref().unwrap();
        assert_eq!(email.html.as_ref().unwrap().chars().count(), HTML_LIMIT);

        assert_eq!(proposal_repo::list_all(&db).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_key_only_updates_flag() {
        let (dir, db, reconciler, rfp) = setup();
        let mail = mail(Some("Proposal"), None);

        reconciler.reconcile(inbound(&rfp, &mail, false)).await.unwrap();
        let again = reconciler.reconcile(inbound(&rfp, &mail, false)).await.unwrap();
        assert!(matches!(again, Reconciliation::Unchanged { .. }));

        let flipped = reconciler.reconcile(inbound(&rfp, &mail, true)).await.unwrap();
        assert!(matches!(flipped, Reconciliation::FlagUpdated { is_read: true, .. }));

        let all = proposal_repo::list_all(&db).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].email.as_ref().unwrap().is_read);

        // Attachments were stored once, for the creating run only.
        let stored = std::fs::read_dir(dir.path().join("attachments")).unwrap().count();
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    async fn test_missing_subject_is_keyed_as_empty() {
        let (_dir, db, reconciler, rfp) = setup();
        let mail = mail(None, None);

        reconciler.reconcile(inbound(&rfp, &mail, false)).await.unwrap();
        reconciler.reconcile(inbound(&rfp, &mail, false)).await.unwrap();

        let all = proposal_repo::list_all(&db).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].email.as_ref().unwrap().subject, "");
    }

    #[tokio::test]
    async fn test_changed_subject_is_a_new_proposal() {
        let (_dir, db, reconciler, rfp) = setup();
        let first = mail(Some("Proposal"), None);
        let reply = mail(Some("Re: Proposal"), None);

        reconciler.reconcile(inbound(&rfp, &first, false)).await.unwrap();
        reconciler.reconcile(inbound(&rfp, &reply, false)).await.unwrap();

        assert_eq!(proposal_repo::list_all(&db).unwrap().len(), 2);
    }
}
