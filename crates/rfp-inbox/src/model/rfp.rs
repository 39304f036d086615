//! Request-for-proposal records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::status::RfpStatus;
use super::Attachment;

/// A stored request for proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rfp {
    pub id: String,
    pub company_name: String,
    pub contact_person: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub project_title: String,
    pub project_description: String,
    pub budget: f64,
    pub deadline: NaiveDate,
    pub requirements: String,
    /// Normalized invited vendor addresses, in invitation order.
    /// Empty means the RFP is open to every vendor.
    pub invited_vendors: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub status: RfpStatus,
    pub created_at: DateTime<Utc>,
}

impl Rfp {
    /// Builds a new pending RFP from submitted fields.
    pub fn from_new(new: NewRfp) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_name: new.company_name.trim().to_string(),
            contact_person: new.contact_person.trim().to_string(),
            contact_email: new.contact_email.map(|e| normalize_address(&e)),
            phone: new.phone.map(|p| p.trim().to_string()),
            project_title: new.project_title.trim().to_string(),
            project_description: new.project_description,
            budget: new.budget,
            deadline: new.deadline,
            requirements: new.requirements,
            invited_vendors: normalize_vendor_list(&new.invited_vendors),
            attachments: new.attachments,
            status: RfpStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// True when no vendor list was given.
    pub fn is_open_to_all(&self) -> bool {
        self.invited_vendors.is_empty()
    }

    /// Whether `address` may respond to this RFP.
    pub fn accepts_vendor(&self, address: &str) -> bool {
        if self.is_open_to_all() {
            return true;
        }
        let normalized = normalize_address(address);
        self.invited_vendors.iter().any(|v| *v == normalized)
    }
}

/// Fields supplied by the RFP submission workflow.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRfp {
    pub company_name: String,
    pub contact_person: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub project_title: String,
    pub project_description: String,
    pub budget: f64,
    pub deadline: NaiveDate,
    pub requirements: String,
    #[serde(default, alias = "selectedVendors")]
    pub invited_vendors: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// An RFP together with its proposal counts, for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RfpSummary {
    #[serde(flatten)]
    pub rfp: Rfp,
    pub response_count: u64,
    pub accepted_count: u64,
}

/// Normalizes a mailbox address for identity comparison.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Normalizes and de-duplicates an invited vendor list, keeping first-seen order.
pub fn normalize_vendor_list(vendors: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(vendors.len());
    for vendor in vendors {
        let normalized = normalize_address(vendor);
        if !normalized.is_empty() && !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}
