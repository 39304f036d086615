use std::path::Path;

use crate::config::schema::{AppConfig, MailboxAuth, MailboxAuthKind, MailboxConfig};
use crate::error::ConfigError;
use crate::secrets::SecretSource;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<AppConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: AppConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub(crate) fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if let Some(mailbox) = &config.mailbox {
        if !mailbox.use_tls {
            return Err(ConfigError::Validation {
                message: "Mailbox connections require TLS (useTls must be true)".to_string(),
            });
        }
        if !mailbox.auth.secret.is_configured() {
            return Err(ConfigError::Secret {
                field: "mailbox.auth.secret",
                reason: "no value, file, or envVar given".to_string(),
            });
        }
    }

    if let Some(url) = &config.notification.webhook_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation {
                message: format!("notification.webhookUrl must be an http(s) URL: {}", url),
            });
        }
    }

    Ok(())
}

impl AppConfig {
    /// Applies deployment environment variables on top of the loaded config.
    ///
    /// `IMAP_HOST`/`IMAP_USER`/`IMAP_PASS`/`IMAP_PORT` fill or override the
    /// mailbox section, `OPENAI_API_KEY` supplies the analysis key when none
    /// is configured, and `RFP_NOTIFY_WEBHOOK` sets the notification webhook.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let (None, Some(host), Some(username)) =
            (self.mailbox.as_ref(), var("IMAP_HOST"), var("IMAP_USER"))
        {
            self.mailbox = Some(MailboxConfig {
                host,
                port: 993,
                use_tls: true,
                username,
                folder: "INBOX".to_string(),
                auth: MailboxAuth {
                    kind: MailboxAuthKind::Password,
                    secret: SecretSource::from_env("IMAP_PASS"),
                },
            });
        }

        if let Some(mailbox) = self.mailbox.as_mut() {
            if let Some(host) = var("IMAP_HOST") {
                mailbox.host = host;
            }
            if let Some(username) = var("IMAP_USER") {
                mailbox.username = username;
            }
            if var("IMAP_PASS").is_some() && mailbox.auth.kind == MailboxAuthKind::Password {
                mailbox.auth.secret = SecretSource::from_env("IMAP_PASS");
            }
            if let Some(port) = var("IMAP_PORT") {
                mailbox.port = port.trim().parse().map_err(|_| ConfigError::Validation {
                    message: format!("IMAP_PORT is not a valid port: {}", port),
                })?;
            }
        }

        if !self.analysis.api_key.is_configured() {
            self.analysis.api_key = SecretSource::from_env("OPENAI_API_KEY");
        }

        if let Some(url) = var("RFP_NOTIFY_WEBHOOK") {
            self.notification.webhook_url = Some(url);
        }

        validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const MINIMAL: &str = r#"{"version": "1.0", "dataDirectory": "/tmp/rfp"}"#;

    fn clear_env() {
        for name in [
            "IMAP_HOST",
            "IMAP_PORT",
            "IMAP_USER",
            "IMAP_PASS",
            "OPENAI_API_KEY",
            "RFP_NOTIFY_WEBHOOK",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.data_directory, "/tmp/rfp");
        assert!(config.mailbox.is_none());
        assert_eq!(config.analysis.temperature, 0.7);
    }

    #[test]
    fn test_load_full_config() {
        let config = load_config_from_str(
            r#"{
                "version": "1.0",
                "dataDirectory": "/srv/rfp",
                "mailbox": {
                    "host": "imap.example.com",
                    "username": "rfp@example.com",
                    "auth": {"type": "password", "secret": {"envVar": "IMAP_PASS"}}
                },
                "analysis": {"model": "gpt-4o", "apiKey": {"file": "/run/secrets/openai"}},
                "notification": {"webhookUrl": "https://hooks.example.com/rfp"},
                "worker": {"syncIntervalSecs": 60}
            }"#,
        )
        .unwrap();
        let mailbox = config.mailbox.unwrap();
        assert_eq!(mailbox.port, 993);
        assert_eq!(mailbox.auth.kind, MailboxAuthKind::Password);
        assert_eq!(config.analysis.model, "gpt-4o");
        assert_eq!(config.worker.sync_interval_secs, 60);
    }

    #[test]
    fn test_schema_rejects_unknown_keys() {
        let err = load_config_from_str(r#"{"version": "1.0", "mailbx": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_schema_rejects_bad_auth_type() {
        let err = load_config_from_str(
            r#"{"version": "1.0", "mailbox": {"host": "h", "username": "u",
                "auth": {"type": "kerberos", "secret": {"value": "x"}}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let err = load_config_from_str(r#"{"version": "2.0"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_rejects_plaintext_mailbox() {
        let err = load_config_from_str(
            r#"{"version": "1.0", "mailbox": {"host": "h", "username": "u", "useTls": false,
                "auth": {"type": "password", "secret": {"value": "x"}}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/rfp-inbox.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides_build_mailbox() {
        clear_env();
        std::env::set_var("IMAP_HOST", "imap.example.com");
        std::env::set_var("IMAP_USER", "rfp@example.com");
        std::env::set_var("IMAP_PASS", "secret");
        std::env::set_var("IMAP_PORT", "1993");
        std::env::set_var("RFP_NOTIFY_WEBHOOK", "https://hooks.example.com/x");

        let mut config = load_config_from_str(MINIMAL).unwrap();
        config.apply_env_overrides().unwrap();

        let mailbox = config.mailbox.unwrap();
        assert_eq!(mailbox.host, "imap.example.com");
        assert_eq!(mailbox.port, 1993);
        assert_eq!(mailbox.auth.secret.env_var.as_deref(), Some("IMAP_PASS"));
        assert_eq!(config.analysis.api_key.env_var.as_deref(), Some("OPENAI_API_KEY"));
        assert_eq!(
            config.notification.webhook_url.as_deref(),
            Some("https://hooks.example.com/x")
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_reject_bad_port() {
        clear_env();
        std::env::set_var("IMAP_HOST", "imap.example.com");
        std::env::set_var("IMAP_USER", "rfp@example.com");
        std::env::set_var("IMAP_PORT", "imap");

        let mut config = AppConfig::default();
        assert!(config.apply_env_overrides().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_without_mailbox_vars() {
        clear_env();
        let mut config = AppConfig::default();
        config.apply_env_overrides().unwrap();
        assert!(config.mailbox.is_none());
    }
}
