//! Domain records shared by ingestion, analysis, and the boundary layer.

use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod proposal;
pub mod rfp;
pub mod status;

pub use analysis::{
    ProposalAnalysis, Recommendation, RiskLevel, StructuredDetails, VendorComparison,
    VendorRanking,
};
pub use proposal::{DedupKey, EmailMetadata, NewVendorResponse, VendorResponse};
pub use rfp::{normalize_address, normalize_vendor_list, NewRfp, Rfp, RfpSummary};
pub use status::{ProposalStatus, RfpStatus, TransitionError, UnknownStatus};

/// Descriptor of a stored attachment. The bytes live in the content store
/// under `key`; the record only references them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub key: String,
    pub media_type: String,
    pub size: u64,
}
