use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};

/// RFC 5322 mailbox: optional display name plus the local@domain address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Address {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl From<&mail_parser::Addr<'_>> for Address {
    fn from(addr: &mail_parser::Addr) -> Self {
        Address {
            name: addr.name.clone().map(|v| v.to_string()),
            address: addr.address.clone().map(|v| v.to_string()),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.address) {
            (Some(name), Some(address)) => write!(f, "{name} <{address}>"),
            (None, Some(address)) => write!(f, "{address}"),
            (Some(name), None) => write!(f, "{name}"),
            (None, None) => Ok(()),
        }
    }
}

/// Collect every mailbox out of an address header, flattening groups.
pub(crate) fn addresses(value: &mail_parser::HeaderValue) -> Vec<Address> {
    match value {
        mail_parser::HeaderValue::Address(addr) => vec![addr.into()],
        mail_parser::HeaderValue::AddressList(list) => list.iter().map(Into::into).collect(),
        mail_parser::HeaderValue::Group(group) => {
            group.addresses.iter().map(Into::into).collect()
        }
        mail_parser::HeaderValue::GroupList(groups) => groups
            .iter()
            .flat_map(|group| group.addresses.iter().map(Into::into))
            .collect(),
        _ => Vec::new(),
    }
}

/// One decoded MIME part, inline or attached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BodySegment {
    /// Full type/subtype form, e.g. `text/plain`.
    pub mime_type: String,
    pub mime_params: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub size: usize,
}

impl BodySegment {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attachment {
    pub segment: BodySegment,
    pub filename: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    pub read_date: Option<DateTime<Utc>>,
}

/// Parsed envelope of a single mail message as handed to forwarders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    pub uid: u32,
    pub mailbox: String,
    pub subject: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub from: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub body: Vec<BodySegment>,
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn has_mime_type(&self, mime_type: &str) -> bool {
        self.body.iter().any(|segment| segment.mime_type == mime_type)
    }
}

/// Result of one retrieval cycle for one mailbox.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailBatch {
    pub last_uid_validity: u32,
    pub last_uid_next: u32,
    pub messages: Vec<Message>,
}
