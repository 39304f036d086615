//! Outbound notification when a proposal is accepted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::NotificationConfig;
use crate::model::{Rfp, VendorResponse};
use crate::sanitize::redact_url;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification is unavailable: no transport is configured")]
    Unavailable,

    #[error("Notification failed: {0}")]
    Failed(String),
}

/// Payload describing an accepted proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceEvent {
    pub event: &'static str,
    pub proposal_id: String,
    pub rfp_id: String,
    pub project_title: String,
    pub company_name: String,
    pub vendor_email: String,
    pub vendor_name: String,
    pub proposed_price: Option<f64>,
    pub accepted_at: DateTime<Utc>,
}

impl AcceptanceEvent {
    pub fn new(proposal: &VendorResponse, rfp: &Rfp) -> Self {
        Self {
            event: "proposal.accepted",
            proposal_id: proposal.id.clone(),
            rfp_id: rfp.id.clone(),
            project_title: rfp.project_title.clone(),
            company_name: rfp.company_name.clone(),
            vendor_email: proposal.vendor_email.clone(),
            vendor_name: proposal.vendor_name.clone(),
            proposed_price: proposal.proposed_price,
            accepted_at: proposal.updated_at,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn proposal_accepted(&self, event: &AcceptanceEvent) -> Result<(), NotifyError>;
}

/// Posts events as JSON to a webhook.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Failed(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn proposal_accepted(&self, event: &AcceptanceEvent) -> Result<(), NotifyError> {
        debug!(url = %redact_url(&self.url), proposal_id = %event.proposal_id, "posting acceptance webhook");
        let response = self
            .http
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| NotifyError::Failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Failed(format!("webhook returned HTTP {}", status)));
        }
        Ok(())
    }
}

/// Used when no transport is configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn proposal_accepted(&self, _event: &AcceptanceEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable)
    }
}

/// Picks the notifier for a configuration.
pub fn notifier_from_config(config: &NotificationConfig) -> Arc<dyn Notifier> {
    match config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => match WebhookNotifier::new(url, Duration::from_secs(config.timeout_secs)) {
            Ok(notifier) => Arc::new(notifier),
            Err(e) => {
                warn!("Webhook notifier disabled: {}", e);
                Arc::new(DisabledNotifier)
            }
        },
        None => Arc::new(DisabledNotifier),
    }
}
