//! Proposal evaluation and vendor comparison.
//!
//! The [`Analyzer`] is a pure request/response component: it builds a prompt,
//! calls the reasoning provider, and validates the structured answer. Writing
//! results back onto records is left to the caller.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info_span, warn, Instrument};

use crate::model::{
    ProposalAnalysis, Recommendation, RiskLevel, Rfp, StructuredDetails, VendorComparison,
    VendorRanking, VendorResponse,
};

use super::error::AnalysisError;
use super::prompt::{
    analysis_prompt, comparison_prompt, extract_json_object, ANALYSIS_SYSTEM_PROMPT,
    COMPARISON_SYSTEM_PROMPT,
};
use super::provider::ReasoningProvider;

/// Fewest analyzed proposals a comparison accepts.
pub const MIN_COMPARISON_SIZE: usize = 2;

/// Fewest strengths or weaknesses a valid evaluation carries.
pub const MIN_POINTS: usize = 2;
/// Most strengths or weaknesses kept from one evaluation.
pub const MAX_POINTS: usize = 4;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    score: Option<f64>,
    recommendation: Option<String>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    budget_analysis: String,
    #[serde(default)]
    timeline_analysis: String,
    #[serde(default)]
    risk_assessment: String,
    #[serde(default)]
    risk_level: Option<String>,
    #[serde(default)]
    key_insights: String,
    #[serde(default)]
    structured_details: StructuredDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComparison {
    #[serde(default)]
    rankings: Vec<VendorRanking>,
    #[serde(default)]
    best_overall: String,
    #[serde(default)]
    best_value: String,
    #[serde(default)]
    lowest_risk: String,
    #[serde(default)]
    final_recommendation: String,
    #[serde(default)]
    alternatives: Vec<String>,
}

fn failure(message: impl Into<String>) -> AnalysisError {
    AnalysisError::Failure(message.into())
}

fn non_empty_points(points: Vec<String>, field: &str) -> Result<Vec<String>, AnalysisError> {
    let mut points: Vec<String> = points
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if points.len() < MIN_POINTS {
        return Err(failure(format!(
            "response has {} {}, expected at least {}",
            points.len(),
            field,
            MIN_POINTS
        )));
    }
    points.truncate(MAX_POINTS);
    Ok(points)
}

/// Parses and validates a completion as a proposal evaluation.
pub fn parse_analysis(text: &str) -> Result<ProposalAnalysis, AnalysisError> {
    let json = extract_json_object(text).ok_or_else(|| failure("response is not a JSON object"))?;
    let raw: RawAnalysis = serde_json::from_str(json)
        .map_err(|e| failure(format!("response has an unexpected shape: {}", e)))?;

    let score = raw.score.ok_or_else(|| failure("response has no score"))?;
    if !(0.0..=100.0).contains(&score) {
        return Err(failure(format!("score {} is outside 0-100", score)));
    }

    let recommendation = raw
        .recommendation
        .as_deref()
        .ok_or_else(|| failure("response has no recommendation"))?
        .parse::<Recommendation>()
        .map_err(failure)?;

    let risk_level = match raw.risk_level.as_deref().map(str::parse::<RiskLevel>) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            debug!("Ignoring risk level from provider: {}", e);
            RiskLevel::infer_from(&raw.risk_assessment)
        }
        None => RiskLevel::infer_from(&raw.risk_assessment),
    };

    Ok(ProposalAnalysis {
        score: score.round() as u8,
        recommendation,
        strengths: non_empty_points(raw.strengths, "strengths")?,
        weaknesses: non_empty_points(raw.weaknesses, "weaknesses")?,
        budget_analysis: raw.budget_analysis,
        timeline_analysis: raw.timeline_analysis,
        risk_assessment: raw.risk_assessment,
        risk_level,
        key_insights: raw.key_insights,
        structured_details: raw.structured_details,
    })
}

/// Parses and validates a completion as a vendor comparison.
pub fn parse_comparison(
    text: &str,
    rfp_id: &str,
    proposals: &[VendorResponse],
) -> Result<VendorComparison, AnalysisError> {
    let json = extract_json_object(text).ok_or_else(|| failure("response is not a JSON object"))?;
    let raw: RawComparison = serde_json::from_str(json)
        .map_err(|e| failure(format!("response has an unexpected shape: {}", e)))?;

    if raw.rankings.is_empty() {
        return Err(failure("response has no rankings"));
    }

    let mut rankings = raw.rankings;
    for ranking in &mut rankings {
        ranking.vendor_email = ranking.vendor_email.trim().to_lowercase();
        if !proposals.iter().any(|p| p.vendor_email == ranking.vendor_email) {
            warn!("Ranking names a vendor that was not compared");
        }
    }
    rankings.sort_by_key(|r| r.rank);

    Ok(VendorComparison {
        rfp_id: rfp_id.to_string(),
        rankings,
        best_overall: raw.best_overall,
        best_value: raw.best_value,
        lowest_risk: raw.lowest_risk,
        final_recommendation: raw.final_recommendation,
        alternatives: raw.alternatives,
        compared_at: Utc::now(),
    })
}

/// Evaluates proposals through an optional reasoning provider.
#[derive(Clone, Default)]
pub struct Analyzer {
    provider: Option<Arc<dyn ReasoningProvider>>,
}

impl Analyzer {
    pub fn new(provider: Option<Arc<dyn ReasoningProvider>>) -> Self {
        Self { provider }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    fn provider(&self) -> Result<&Arc<dyn ReasoningProvider>, AnalysisError> {
        self.provider.as_ref().ok_or(AnalysisError::Unavailable)
    }

    /// Scores one proposal against its RFP.
    pub async fn analyze(
        &self,
        rfp: &Rfp,
        proposal: &VendorResponse,
    ) -> Result<ProposalAnalysis, AnalysisError> {
        let provider = self.provider()?;
        let span = info_span!("analyze_proposal", proposal_id = %proposal.id, provider = %provider.name());
        async {
            let prompt = analysis_prompt(rfp, proposal);
            let text = provider.complete_json(ANALYSIS_SYSTEM_PROMPT, &prompt).await?;
            let analysis = parse_analysis(&text)?;
            debug!(
                score = analysis.score,
                recommendation = %analysis.recommendation,
                "proposal analyzed"
            );
            Ok::<_, AnalysisError>(analysis)
        }
        .instrument(span)
        .await
    }

    /// Ranks the analyzed proposals of one RFP.
    pub async fn compare(
        &self,
        rfp: &Rfp,
        proposals: &[VendorResponse],
    ) -> Result<VendorComparison, AnalysisError> {
        if proposals.len() < MIN_COMPARISON_SIZE {
            return Err(AnalysisError::InsufficientData {
                required: MIN_COMPARISON_SIZE,
                found: proposals.len(),
            });
        }
        let provider = self.provider()?;
        let span = info_span!("compare_vendors", rfp_id = %rfp.id, vendors = proposals.len());
        async {
            let prompt = comparison_prompt(rfp, proposals);
            let text = provider
                .complete_json(COMPARISON_SYSTEM_PROMPT, &prompt)
                .await?;
            parse_comparison(&text, &rfp.id, proposals)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "score": 82,
        "recommendation": "Recommended",
        "strengths": ["Competitive price", "Clear plan", "Strong team", "Fast", "Extra"],
        "weaknesses": ["Tight timeline", "Limited references"],
        "budgetAnalysis": "Within budget",
        "timelineAnalysis": "Meets the deadline",
        "riskAssessment": "Overall low risk.",
        "keyInsights": "Solid proposal.",
        "structuredDetails": {
            "coreCompetencies": ["Rust"],
            "deliverables": ["Site"],
            "specialTerms": "",
            "uniqueSellingPoints": []
        }
    }"#;

    #[test]
    fn test_parse_valid_analysis() {
        let analysis = parse_analysis(VALID).unwrap();
        assert_eq!(analysis.score, 82);
        assert_eq!(analysis.recommendation, Recommendation::Recommended);
        assert_eq!(analysis.strengths.len(), MAX_POINTS);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert_eq!(analysis.structured_details.core_competencies, vec!["Rust"]);
    }

    #[test]
    fn test_explicit_risk_level_wins() {
        let text = VALID.replace(
            r#""keyInsights""#,
            r#""riskLevel": "High", "keyInsights""#,
        );
        assert_eq!(parse_analysis(&text).unwrap().risk_level, RiskLevel::High);
    }

    #[test]
    fn test_rejects_out_of_range_score() {
        let text = VALID.replace("\"score\": 82", "\"score\": 140");
        assert!(matches!(parse_analysis(&text), Err(AnalysisError::Failure(_))));
    }

    #[test]
    fn test_rejects_unknown_recommendation() {
        let text = VALID.replace("\"Recommended\"", "\"Maybe\"");
        assert!(matches!(parse_analysis(&text), Err(AnalysisError::Failure(_))));
    }

    #[test]
    fn test_rejects_missing_weaknesses() {
        let text = VALID.replace(
            r#"["Tight timeline", "Limited references"]"#,
            "[]",
        );
        assert!(matches!(parse_analysis(&text), Err(AnalysisError::Failure(_))));
    }

    #[test]
    fn test_rejects_single_strength_or_weakness() {
        let one_strength = VALID.replace(
            r#"["Competitive price", "Clear plan", "Strong team", "Fast", "Extra"]"#,
            r#"["Only one"]"#,
        );
        assert!(matches!(
            parse_analysis(&one_strength),
            Err(AnalysisError::Failure(_))
        ));

        let one_weakness = VALID.replace(
            r#"["Tight timeline", "Limited references"]"#,
            r#"["Only one", "   "]"#,
        );
        assert!(matches!(
            parse_analysis(&one_weakness),
            Err(AnalysisError::Failure(_))
        ));
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            parse_analysis("I cannot help with that."),
            Err(AnalysisError::Failure(_))
        ));
    }

    #[test]
    fn test_parse_comparison_sorts_by_rank() {
        let text = r#"{
            "rankings": [
                {"vendorEmail": "B@x.com", "rank": 2, "reason": "Pricier"},
                {"vendorEmail": "a@x.com", "rank": 1, "reason": "Best fit"}
            ],
            "bestOverall": "a@x.com",
            "bestValue": "a@x.com",
            "lowestRisk": "b@x.com",
            "finalRecommendation": "Go with A",
            "alternatives": ["b@x.com"]
        }"#;
        let comparison = parse_comparison(text, "r1", &[]).unwrap();
        assert_eq!(comparison.rfp_id, "r1");
        assert_eq!(comparison.rankings[0].vendor_email, "a@x.com");
        assert_eq!(comparison.rankings[1].vendor_email, "b@x.com");
        assert_eq!(comparison.alternatives, vec!["b@x.com"]);
    }

    #[test]
    fn test_comparison_without_rankings_fails() {
        let result = parse_comparison(r#"{"bestOverall": "a@x.com"}"#, "r1", &[]);
        assert!(matches!(result, Err(AnalysisError::Failure(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_analyzer_is_unavailable() {
        use crate::model::{NewRfp, NewVendorResponse};
        use chrono::NaiveDate;

        let rfp = Rfp::from_new(NewRfp {
            company_name: "Acme".to_string(),
            contact_person: "Ann".to_string(),
            contact_email: None,
            phone: None,
            project_title: "Site".to_string(),
            project_description: "Build".to_string(),
            budget: 1000.0,
            deadline: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            requirements: "None".to_string(),
            invited_vendors: vec![],
            attachments: vec![],
        });
        let proposal = VendorResponse::from_new(NewVendorResponse {
            rfp_id: rfp.id.clone(),
            vendor_email: "a@x.com".to_string(),
            vendor_name: "A".to_string(),
            ..Default::default()
        });

        let analyzer = Analyzer::default();
        assert!(!analyzer.is_available());
        assert!(matches!(
            analyzer.analyze(&rfp, &proposal).await,
            Err(AnalysisError::Unavailable)
        ));

        let one = vec![proposal];
        assert!(matches!(
            analyzer.compare(&rfp, &one).await,
            Err(AnalysisError::InsufficientData { required: 2, found: 1 })
        ));
    }
}
