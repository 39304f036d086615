//! IMAP client for the shared proposal mailbox.

use async_imap::types::Flag;
use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::config::{MailboxAuthKind, MailboxConfig};

use super::error::{EmailError, Result};
use super::mailbox::{FetchedMessage, InboxStats, MailboxConnector, MailboxSession};

/// Type alias for the underlying async stream (using async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Authenticator for SASL XOAUTH2.
struct XOAuth2Authenticator {
    response: String,
}

impl async_imap::Authenticator for XOAuth2Authenticator {
    type Response = String;

    fn process(&mut self, _data: &[u8]) -> Self::Response {
        std::mem::take(&mut self.response)
    }
}

/// Builds the XOAUTH2 initial response: `user=<u>^Aauth=Bearer <t>^A^A`, base64.
fn xoauth2_response(username: &str, token: &SecretString) -> String {
    let auth_string = format!(
        "user={}\x01auth=Bearer {}\x01\x01",
        username,
        token.expose_secret()
    );
    base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        auth_string.as_bytes(),
    )
}

/// IMAP search criterion for messages received since a date (`SINCE 01-Jan-2026`).
pub fn since_query(since: NaiveDate) -> String {
    format!("SINCE {}", since.format("%d-%b-%Y"))
}

fn folder_error(folder: &str, e: async_imap::error::Error) -> EmailError {
    let message = e.to_string();
    if message.contains("Mailbox doesn't exist") || message.contains("NO") {
        EmailError::FolderNotFound(folder.to_string())
    } else {
        EmailError::ProtocolError(message)
    }
}

/// Live IMAP session over TLS.
pub struct ImapClient {
    session: Option<Session<TlsStream>>,
    config: MailboxConfig,
}

impl ImapClient {
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            session: None,
            config,
        }
    }

    /// Connects to the IMAP server and authenticates.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected to IMAP server");
            return Ok(());
        }

        if !self.config.use_tls {
            return Err(EmailError::ConfigError(
                "TLS is required for secure email connections".to_string(),
            ));
        }

        let secret = self
            .config
            .auth
            .secret
            .resolve()
            .map_err(|e| EmailError::CredentialsNotFound(e.to_string()))?;

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Connecting to IMAP server at {}", addr);

        let std_stream = std::net::TcpStream::connect(&addr)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
        std_stream
            .set_nonblocking(true)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
        let tcp_stream = async_io::Async::new(std_stream)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;

        let tls_stream = TlsConnector::new()
            .connect(&self.config.host, tcp_stream)
            .await
            .map_err(|e| EmailError::TlsError(e.to_string()))?;

        let client = async_imap::Client::new(tls_stream);

        let session = match self.config.auth.kind {
            MailboxAuthKind::Password => client
                .login(&self.config.username, secret.expose_secret())
                .await
                .map_err(|(e, _)| EmailError::AuthenticationFailed(e.to_string()))?,
            MailboxAuthKind::Oauth2 => client
                .authenticate(
                    "XOAUTH2",
                    XOAuth2Authenticator {
                        response: xoauth2_response(&self.config.username, &secret),
                    },
                )
                .await
                .map_err(|(e, _)| EmailError::AuthenticationFailed(e.to_string()))?,
        };

        info!("Successfully authenticated to IMAP server");
        self.session = Some(session);
        Ok(())
    }

    fn session(&mut self) -> Result<&mut Session<TlsStream>> {
        self.session
            .as_mut()
            .ok_or_else(|| EmailError::ConnectionFailed("Not connected".to_string()))
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

#[async_trait]
impl MailboxSession for ImapClient {
    async fn select(&mut self, folder: &str) -> Result<()> {
        info!("Selecting folder: {}", folder);
        self.session()?
            .select(folder)
            .await
            .map_err(|e| folder_error(folder, e))?;
        Ok(())
    }

    async fn examine(&mut self, folder: &str) -> Result<InboxStats> {
        info!("Examining folder: {}", folder);
        let session = self.session()?;
        let mailbox = session
            .examine(folder)
            .await
            .map_err(|e| folder_error(folder, e))?;

        let unseen = session
            .search("UNSEEN")
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

        Ok(InboxStats {
            total: mailbox.exists,
            new: mailbox.recent,
            unseen: unseen.len() as u32,
        })
    }

    async fn search_since(&mut self, since: NaiveDate) -> Result<Vec<u32>> {
        let query = since_query(since);
        debug!("Searching with query: {}", query);

        let uids = self
            .session()?
            .uid_search(&query)
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

        let mut uid_list: Vec<u32> = uids.into_iter().collect();
        uid_list.sort_unstable();
        debug!("Found {} messages since {}", uid_list.len(), since);
        Ok(uid_list)
    }

    async fn fetch(&mut self, uids: &[u32]) -> Result<Vec<FetchedMessage>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let uid_set = uids
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");
        debug!("Fetching {} emails", uids.len());

        let mut messages = self
            .session()?
            .uid_fetch(&uid_set, "(UID FLAGS BODY.PEEK[])")
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(message_result) = messages.next().await {
            match message_result {
                Ok(message) => {
                    let seen = message.flags().any(|f| matches!(f, Flag::Seen));
                    if let (Some(uid), Some(body)) = (message.uid, message.body()) {
                        results.push(FetchedMessage {
                            uid,
                            seen,
                            raw: body.to_vec(),
                        });
                    } else {
                        warn!("Message missing UID or body");
                    }
                }
                Err(e) => {
                    return Err(EmailError::ProtocolError(e.to_string()));
                }
            }
        }

        debug!("Successfully fetched {} emails", results.len());
        Ok(results)
    }

    async fn logout(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from IMAP server");
            session
                .logout()
                .await
                .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapClient dropped without explicit logout - session will be closed");
        }
    }
}

/// Connects [`ImapClient`] sessions for a configured mailbox.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    config: MailboxConfig,
}

impl ImapConnector {
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailboxConnector for ImapConnector {
    async fn connect(&self) -> Result<Box<dyn MailboxSession>> {
        let mut client = ImapClient::new(self.config.clone());
        client.connect().await?;
        Ok(Box::new(client))
    }

    fn folder(&self) -> &str {
        &self.config.folder
    }
}
