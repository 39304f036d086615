//! Vendor responses (proposals) against an RFP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::ProposalAnalysis;
use super::rfp::normalize_address;
use super::status::ProposalStatus;
use super::Attachment;

/// Mail metadata kept for mailbox-sourced proposals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMetadata {
    /// Subject as received; an absent subject is stored as an empty string.
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    pub is_read: bool,
}

/// A stored vendor response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorResponse {
    pub id: String,
    pub rfp_id: String,
    pub vendor_email: String,
    pub vendor_name: String,
    pub proposed_price: Option<f64>,
    pub timeline: Option<String>,
    pub experience: Option<String>,
    pub approach: Option<String>,
    pub team_size: Option<u32>,
    pub previous_work: Option<String>,
    pub notes: Option<String>,
    pub email: Option<EmailMetadata>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub analysis: Option<ProposalAnalysis>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub status: ProposalStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VendorResponse {
    /// Builds a new pending record with a fresh id.
    pub fn from_new(new: NewVendorResponse) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rfp_id: new.rfp_id,
            vendor_email: normalize_address(&new.vendor_email),
            vendor_name: new.vendor_name.trim().to_string(),
            proposed_price: new.proposed_price,
            timeline: new.timeline,
            experience: new.experience,
            approach: new.approach,
            team_size: new.team_size,
            previous_work: new.previous_work,
            notes: new.notes,
            email: new.email,
            attachments: new.attachments,
            analysis: None,
            analyzed_at: None,
            status: ProposalStatus::Pending,
            submitted_at: now,
            updated_at: now,
        }
    }

    /// The dedup key, present only for mailbox-sourced records.
    pub fn dedup_key(&self) -> Option<DedupKey> {
        self.email.as_ref().map(|mail| DedupKey {
            rfp_id: self.rfp_id.clone(),
            vendor_email: self.vendor_email.clone(),
            subject: mail.subject.clone(),
        })
    }
}

/// Fields supplied when creating a proposal, either from the web form or
/// from an inbound message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVendorResponse {
    pub rfp_id: String,
    pub vendor_email: String,
    pub vendor_name: String,
    #[serde(default)]
    pub proposed_price: Option<f64>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub approach: Option<String>,
    #[serde(default)]
    pub team_size: Option<u32>,
    #[serde(default)]
    pub previous_work: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(skip)]
    pub email: Option<EmailMetadata>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Natural identity of a mailbox-sourced proposal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub rfp_id: String,
    pub vendor_email: String,
    pub subject: String,
}

impl DedupKey {
    pub fn new(rfp_id: &str, vendor_email: &str, subject: &str) -> Self {
        Self {
            rfp_id: rfp_id.to_string(),
            vendor_email: normalize_address(vendor_email),
            subject: subject.to_string(),
        }
    }
}
