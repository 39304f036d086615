use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::secrets::{expand_home, SecretSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub version: String,
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
    #[serde(default)]
    pub mailbox: Option<MailboxConfig>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

fn default_data_directory() -> String {
    "~/.rfp-inbox".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            data_directory: default_data_directory(),
            mailbox: None,
            analysis: AnalysisConfig::default(),
            notification: NotificationConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.data_directory))
    }

    /// Root of the attachment content store.
    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir().join("attachments")
    }

    pub fn database_path(&self) -> PathBuf {
        crate::db::database_path(&self.data_dir())
    }
}

/// Shared mailbox the synchronizer polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxConfig {
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    pub username: String,
    #[serde(default = "default_folder")]
    pub folder: String,
    pub auth: MailboxAuth,
}

fn default_imap_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_folder() -> String {
    "INBOX".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxAuth {
    #[serde(rename = "type")]
    pub kind: MailboxAuthKind,
    pub secret: SecretSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxAuthKind {
    /// LOGIN with a password or app password.
    Password,
    /// SASL XOAUTH2 with a bearer token.
    Oauth2,
}

/// Reasoning provider settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: SecretSource,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
    /// Background analyses allowed to run at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_analysis_timeout() -> u64 {
    120
}

fn default_max_concurrent() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: SecretSource::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_analysis_timeout(),
            max_concurrent: default_max_concurrent(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
}

fn default_sync_interval() -> u64 {
    300
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.version, "1.0");
        assert!(config.mailbox.is_none());
        assert_eq!(config.analysis.model, "gpt-4-turbo-preview");
        assert_eq!(config.analysis.max_tokens, 2000);
        assert!(!config.analysis.api_key.is_configured());
        assert!(config.notification.webhook_url.is_none());
        assert_eq!(config.worker.sync_interval_secs, 300);
    }

    #[test]
    fn test_mailbox_defaults_from_json() {
        let mailbox: MailboxConfig = serde_json::from_str(
            r#"{"host": "imap.example.com", "username": "rfp@example.com",
                "auth": {"type": "oauth2", "secret": {"envVar": "IMAP_TOKEN"}}}"#,
        )
        .unwrap();
        assert_eq!(mailbox.port, 993);
        assert!(mailbox.use_tls);
        assert_eq!(mailbox.folder, "INBOX");
        assert_eq!(mailbox.auth.kind, MailboxAuthKind::Oauth2);
    }

    #[test]
    fn test_paths_derive_from_data_directory() {
        let config = AppConfig {
            data_directory: "/srv/rfp".to_string(),
            ..Default::default()
        };
        assert_eq!(config.attachments_dir(), PathBuf::from("/srv/rfp/attachments"));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/rfp/data/rfp-inbox.db")
        );
    }
}
