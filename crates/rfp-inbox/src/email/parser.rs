//! Parsing raw RFC 822 messages into the fields the pipeline consumes.

use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use mail_parser::{MessageParser, MimeHeaders, PartType};

use super::error::{EmailError, Result};

/// An attachment carried by an inbound message.
#[derive(Debug, Clone)]
pub struct MailAttachment {
    /// Filename as sent, or a generated `attachment.<ext>` when absent.
    pub filename: String,
    pub media_type: String,
    pub content: Vec<u8>,
}

/// The parts of an inbound message used for proposal ingestion.
#[derive(Debug, Clone)]
pub struct InboundMail {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    /// Sender address as written in the From header (not normalized).
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    /// Plain text body; HTML-only messages are converted to text.
    pub text: String,
    /// The HTML body, only when the message actually carries one.
    pub html: Option<String>,
    pub attachments: Vec<MailAttachment>,
}

/// Parses raw message bytes.
pub fn parse_message(raw: &[u8]) -> Result<InboundMail> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| EmailError::ParseError("Failed to parse email message".to_string()))?;

    let sender = message.from().and_then(|addr| addr.first());
    let from_address = sender
        .and_then(|a| a.address())
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    let from_name = sender
        .and_then(|a| a.name())
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let date = message
        .date()
        .and_then(|d| Utc.timestamp_opt(d.to_timestamp(), 0).single());

    let text = message
        .body_text(0)
        .map(|t| t.into_owned())
        .unwrap_or_default();

    let html = message.html_bodies().find_map(|part| match &part.body {
        PartType::Html(html) => Some(html.to_string()),
        _ => None,
    });

    let attachments = message
        .attachments()
        .map(|part| {
            let media_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let filename = part
                .attachment_name()
                .map(|n| n.to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("attachment.{}", mime_to_extension(&media_type)));
            MailAttachment {
                filename,
                media_type,
                content: part.contents().to_vec(),
            }
        })
        .collect::<Vec<_>>();

    let mail = InboundMail {
        message_id: message.message_id().map(|s| s.to_string()),
        subject: message.subject().map(|s| s.to_string()),
        from_address,
        from_name,
        date,
        text,
        html,
        attachments,
    };

    debug!(
        "Parsed email subject={:?} with {} attachments",
        mail.subject.as_deref().unwrap_or("(no subject)"),
        mail.attachments.len()
    );
    Ok(mail)
}

/// Converts a MIME type to a file extension.
fn mime_to_extension(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/zip" => "zip",
        "application/json" => "json",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        _ => "bin",
    }
}
