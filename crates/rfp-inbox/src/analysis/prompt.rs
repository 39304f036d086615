//! Prompt construction for proposal evaluation and vendor comparison.

use crate::email::extract::truncate_chars;
use crate::model::{Rfp, VendorResponse};

/// Characters of the email body quoted in an evaluation prompt.
pub const BODY_EXCERPT_LIMIT: usize = 2000;

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert procurement analyst. Analyze vendor \
responses to RFPs and provide detailed, objective assessments. Always respond with valid JSON only.";

pub const COMPARISON_SYSTEM_PROMPT: &str = "You are an expert procurement consultant. Compare \
vendor responses objectively and provide clear recommendations. Always respond with valid JSON only.";

const ANALYSIS_INSTRUCTIONS: &str = r#"Please analyze this vendor response comprehensively and provide:

1. Overall Score (0-100): rate the vendor's suitability based on pricing competitiveness against the budget, timeline feasibility against the deadline, experience and qualifications, proposal completeness, and communication clarity.
2. Strengths: 2-4 specific strengths of this proposal.
3. Weaknesses: 2-4 potential concerns or areas of improvement.
4. Budget Analysis: compare the proposed price with the RFP budget; note if the price is missing.
5. Timeline Analysis: assess whether the timeline can meet the deadline; note if it is missing.
6. Risk Assessment: identify potential risks and rate the risk level as Low, Medium, or High.
7. Recommendation: exactly one of "Highly Recommended", "Recommended", "Consider with Caution", "Not Recommended".
8. Key Insights: a 2-3 sentence executive summary.
9. Structured Details: core competencies, deliverables promised, special terms or conditions, unique selling points.

Respond with JSON in exactly this structure:
{
  "score": 85,
  "recommendation": "Highly Recommended",
  "strengths": ["Specific strength 1", "Specific strength 2"],
  "weaknesses": ["Specific concern 1", "Specific concern 2"],
  "budgetAnalysis": "Comparison of proposed price vs RFP budget",
  "timelineAnalysis": "Assessment of timeline vs deadline",
  "riskAssessment": "Risk analysis",
  "riskLevel": "Low",
  "keyInsights": "Executive summary in 2-3 sentences",
  "structuredDetails": {
    "coreCompetencies": ["competency1"],
    "deliverables": ["deliverable1"],
    "specialTerms": "Special terms or conditions",
    "uniqueSellingPoints": ["USP1"]
  }
}"#;

const COMPARISON_INSTRUCTIONS: &str = r#"Provide a comparative analysis with:
1. Rankings: every vendor ordered from best to worst with a justification.
2. Best Overall: the best choice.
3. Best Value: the best value for money.
4. Lowest Risk: the lowest risk profile.
5. Final Recommendation: your top recommendation with detailed reasoning.
6. Alternatives: backup choices if the top choice falls through.

Respond with JSON in exactly this structure, using vendor email addresses as identifiers:
{
  "rankings": [
    {"vendorEmail": "vendor@example.com", "rank": 1, "reason": "why ranked here"}
  ],
  "bestOverall": "vendor@example.com",
  "bestValue": "vendor@example.com",
  "lowestRisk": "vendor@example.com",
  "finalRecommendation": "detailed recommendation",
  "alternatives": ["other@example.com"]
}"#;

/// Formats an amount with thousands separators, e.g. `12500.5` as `12,500.50`.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let (whole, frac) = (cents.abs() / 100, cents.abs() % 100);
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if cents < 0 { "-" } else { "" };
    if frac == 0 {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac:02}")
    }
}

fn or_unspecified(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("Not specified")
}

fn attachments_summary(proposal: &VendorResponse) -> String {
    if proposal.attachments.is_empty() {
        return "No attachments".to_string();
    }
    proposal
        .attachments
        .iter()
        .map(|a| format!("{} ({}, {:.2} KB)", a.filename, a.media_type, a.size as f64 / 1024.0))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds the user prompt for evaluating one proposal against its RFP.
pub fn analysis_prompt(rfp: &Rfp, proposal: &VendorResponse) -> String {
    let price = proposal
        .proposed_price
        .map(|p| format!("${}", format_amount(p)))
        .unwrap_or_else(|| "Not specified".to_string());
    let team_size = proposal
        .team_size
        .map(|t| t.to_string())
        .unwrap_or_else(|| "Not specified".to_string());

    let subject = proposal
        .email
        .as_ref()
        .map(|m| m.subject.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("N/A");
    let body = match &proposal.email {
        Some(mail) if !mail.body.is_empty() => truncate_chars(&mail.body, BODY_EXCERPT_LIMIT),
        _ => proposal
            .approach
            .as_deref()
            .map(|a| truncate_chars(a, BODY_EXCERPT_LIMIT))
            .unwrap_or_else(|| "N/A".to_string()),
    };

    let mut prompt = format!(
        "You are an expert procurement analyst. Analyze this vendor response to an RFP and provide a detailed, structured assessment.\n\n\
         RFP DETAILS:\n\
         - Project Title: {title}\n\
         - Budget: ${budget}\n\
         - Deadline: {deadline}\n\
         - Requirements: {requirements}\n\
         - Description: {description}\n\n\
         VENDOR RESPONSE:\n\
         - Vendor Name: {vendor_name}\n\
         - Vendor Email: {vendor_email}\n\
         - Proposed Price: {price}\n\
         - Estimated Timeline: {timeline}\n\
         - Experience: {experience}\n\
         - Team Size: {team_size}\n\
         - Previous Work: {previous_work}\n\
         - Attachments: {attachments}\n\n\
         EMAIL CONTENT:\n\
         - Subject: {subject}\n\
         - Body: {body}\n\n",
        title = rfp.project_title,
        budget = format_amount(rfp.budget),
        deadline = rfp.deadline.format("%Y-%m-%d"),
        requirements = rfp.requirements,
        description = rfp.project_description,
        vendor_name = proposal.vendor_name,
        vendor_email = proposal.vendor_email,
        timeline = or_unspecified(proposal.timeline.as_deref()),
        experience = or_unspecified(proposal.experience.as_deref()),
        previous_work = or_unspecified(proposal.previous_work.as_deref()),
        attachments = attachments_summary(proposal),
    );

    prompt.push_str(ANALYSIS_INSTRUCTIONS);
    prompt
}

fn vendor_section(number: usize, proposal: &VendorResponse) -> String {
    let analysis = proposal.analysis.as_ref();
    let score = analysis
        .map(|a| a.score.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let price = proposal
        .proposed_price
        .map(|p| format!("${}", format_amount(p)))
        .unwrap_or_else(|| "Not specified".to_string());
    let recommendation = analysis
        .map(|a| a.recommendation.as_str())
        .unwrap_or("Not analyzed");
    let strengths = analysis
        .filter(|a| !a.strengths.is_empty())
        .map(|a| a.strengths.join(", "))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "\nVENDOR {number}: {email}\n\
         - Score: {score}\n\
         - Price: {price}\n\
         - Timeline: {timeline}\n\
         - Recommendation: {recommendation}\n\
         - Key Strengths: {strengths}\n",
        email = proposal.vendor_email,
        timeline = or_unspecified(proposal.timeline.as_deref()),
    )
}

/// Builds the user prompt for ranking analyzed proposals of one RFP.
pub fn comparison_prompt(rfp: &Rfp, proposals: &[VendorResponse]) -> String {
    let mut prompt = format!(
        "You are an expert procurement consultant. Compare these vendor responses for an RFP and provide a final recommendation.\n\n\
         RFP DETAILS:\n\
         - Project Title: {title}\n\
         - Budget: ${budget}\n\
         - Deadline: {deadline}\n\
         - Requirements: {requirements}\n\n\
         VENDOR RESPONSES:\n",
        title = rfp.project_title,
        budget = format_amount(rfp.budget),
        deadline = rfp.deadline.format("%Y-%m-%d"),
        requirements = rfp.requirements,
    );
    for (index, proposal) in proposals.iter().enumerate() {
        prompt.push_str(&vendor_section(index + 1, proposal));
    }
    prompt.push('\n');
    prompt.push_str(COMPARISON_INSTRUCTIONS);
    prompt
}

/// Finds the JSON object in a completion, tolerating code fences and prose.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```") {
        let after_fence = start + 3;
        if let Some(nl) = trimmed[after_fence..].find('\n') {
            let body_start = after_fence + nl + 1;
            if let Some(end) = trimmed[body_start..].find("```") {
                let candidate = trimmed[body_start..body_start + end].trim();
                if candidate.starts_with('{') {
                    return Some(candidate);
                }
            }
        }
    }

    let start = trimmed.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, b) in trimmed.bytes().enumerate().skip(start) {
        if escape {
            escape = false;
            continue;
        }
        match b {
            b'\\' if in_string => escape = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&trimmed[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
