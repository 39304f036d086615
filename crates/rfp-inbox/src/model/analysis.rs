//! Analysis and comparison results attached to proposals.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Four-value ordinal scale, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Highly Recommended")]
    HighlyRecommended,
    #[serde(rename = "Recommended")]
    Recommended,
    #[serde(rename = "Consider with Caution")]
    ConsiderWithCaution,
    #[serde(rename = "Not Recommended")]
    NotRecommended,
}

impl Recommendation {
    pub const ALL: [Recommendation; 4] = [
        Recommendation::HighlyRecommended,
        Recommendation::Recommended,
        Recommendation::ConsiderWithCaution,
        Recommendation::NotRecommended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::HighlyRecommended => "Highly Recommended",
            Recommendation::Recommended => "Recommended",
            Recommendation::ConsiderWithCaution => "Consider with Caution",
            Recommendation::NotRecommended => "Not Recommended",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recommendation {
    type Err = String;

    /// Case-insensitive match against the four labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown recommendation '{}'", wanted))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Reads the level implied by a free-text risk assessment.
    ///
    /// An explicit "high"/"low" mention wins; anything else is Medium.
    pub fn infer_from(assessment: &str) -> Self {
        let text = assessment.to_lowercase();
        if text.contains("high risk") || text.starts_with("high") {
            RiskLevel::High
        } else if text.contains("low risk") || text.starts_with("low") {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredDetails {
    #[serde(default)]
    pub core_competencies: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub special_terms: String,
    #[serde(default)]
    pub unique_selling_points: Vec<String>,
}

/// A validated evaluation of one proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalAnalysis {
    pub score: u8,
    pub recommendation: Recommendation,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub budget_analysis: String,
    pub timeline_analysis: String,
    pub risk_assessment: String,
    pub risk_level: RiskLevel,
    pub key_insights: String,
    #[serde(default)]
    pub structured_details: StructuredDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRanking {
    pub vendor_email: String,
    pub rank: u32,
    pub reason: String,
}

/// A comparative ranking of the analyzed proposals of one RFP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorComparison {
    pub rfp_id: String,
    /// Sorted by rank, best first.
    pub rankings: Vec<VendorRanking>,
    pub best_overall: String,
    pub best_value: String,
    pub lowest_risk: String,
    pub final_recommendation: String,
    pub alternatives: Vec<String>,
    pub compared_at: DateTime<Utc>,
}
