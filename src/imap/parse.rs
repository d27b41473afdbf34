use chrono::{DateTime, Utc};
use mail_parser::{ContentType, MessagePart, MimeHeaders};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::MalformedMessage;
use crate::message::{addresses, Attachment, BodySegment, Message};

/// Turn one fetched body section into the in-memory message model.
pub(super) fn message(
    uid: u32,
    raw: &[u8],
    client: &ClientConfig,
    mailbox: &str,
) -> Result<Message, MalformedMessage> {
    let parsed = mail_parser::Message::parse(raw).ok_or(MalformedMessage::Mime)?;

    let mut message = Message {
        uid,
        mailbox: mailbox.to_string(),
        subject: parsed.subject().map(str::to_string),
        date: parsed
            .date()
            .and_then(|date| DateTime::parse_from_rfc3339(&date.to_rfc3339()).ok())
            .map(|date| date.with_timezone(&Utc)),
        from: addresses(parsed.from()),
        to: addresses(parsed.to()),
        cc: addresses(parsed.cc()),
        bcc: addresses(parsed.bcc()),
        reply_to: addresses(parsed.reply_to()),
        ..Default::default()
    };

    let mut pos = 0;
    while let Some(text) = parsed.body_text(pos) {
        message.body.push(segment("text/plain", text.as_bytes()));
        pos += 1;
    }
    let mut pos = 0;
    while let Some(html) = parsed.body_html(pos) {
        message.body.push(segment("text/html", html.as_bytes()));
        pos += 1;
    }

    if client.include_attachments {
        let limit = client.max_attachments_size.as_u64();

        for part in parsed.attachments() {
            let size = part.contents().len();
            if size as u64 > limit {
                debug!(
                    uid,
                    filename = part.attachment_name().unwrap_or_default(),
                    size = %humansize::format_size(size, humansize::DECIMAL),
                    "dropping attachment above the configured size limit"
                );
                continue;
            }

            message.attachments.push(attachment(part));
        }
    }

    Ok(message)
}

fn segment(mime_type: &str, body: &[u8]) -> BodySegment {
    BodySegment {
        mime_type: mime_type.to_string(),
        mime_params: Vec::new(),
        body: body.to_vec(),
        size: body.len(),
    }
}

fn attachment(part: &MessagePart) -> Attachment {
    let (mime_type, mime_params) = content_type(part);
    let contents = part.contents();
    let disposition = part.content_disposition();

    Attachment {
        segment: BodySegment {
            mime_type,
            mime_params,
            body: contents.to_vec(),
            size: contents.len(),
        },
        filename: part.attachment_name().map(str::to_string),
        creation_date: disposition.and_then(|d| date_attribute(d, "creation-date")),
        modification_date: disposition.and_then(|d| date_attribute(d, "modification-date")),
        read_date: disposition.and_then(|d| date_attribute(d, "read-date")),
    }
}

fn content_type(part: &MessagePart) -> (String, Vec<(String, String)>) {
    match part.content_type() {
        Some(content_type) => {
            let mime = match &content_type.c_subtype {
                Some(subtype) => format!("{}/{}", content_type.c_type, subtype),
                None => content_type.c_type.to_string(),
            };
            let params = content_type
                .attributes
                .as_ref()
                .map(|attributes| {
                    attributes
                        .iter()
                        .map(|(key, value)| (key.to_string(), value.to_string()))
                        .collect()
                })
                .unwrap_or_default();

            (mime, params)
        }
        None => ("application/octet-stream".to_string(), Vec::new()),
    }
}

/// Best-effort RFC 2822 date out of a Content-Disposition attribute.
fn date_attribute(disposition: &ContentType, name: &str) -> Option<DateTime<Utc>> {
    let attributes = disposition.attributes.as_ref()?;
    let value = attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)?;

    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
