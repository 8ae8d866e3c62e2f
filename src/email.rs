use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain_utils::DomainUtils;

/// Coarse intent of a message. Every classified record carries exactly one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EmailType {
    #[default]
    Schedule,
    Update,
    Press,
    Technical,
    Marketing,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Schedule => "schedule",
            EmailType::Update => "update",
            EmailType::Press => "press",
            EmailType::Technical => "technical",
            EmailType::Marketing => "marketing",
        }
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "schedule" => Ok(EmailType::Schedule),
            "update" => Ok(EmailType::Update),
            "press" => Ok(EmailType::Press),
            "technical" => Ok(EmailType::Technical),
            "marketing" => Ok(EmailType::Marketing),
            other => anyhow::bail!("Unknown email type: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub content_type: String,
    /// Size in bytes
    pub size: u64,
}

/// A normalized message record.
///
/// Built by the classifier from a [`RawMessage`]; `is_duplicate` is only
/// meaningful after a duplicate detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    pub subject: String,
    pub from: String,
    /// Plain-text preview, empty when the payload carried none
    #[serde(default)]
    pub body: String,
    pub supplier: String,
    pub channel: String,
    #[serde(rename = "type")]
    pub email_type: EmailType,
    pub has_attachments: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub received_date_time: DateTime<FixedOffset>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_flagged: bool,
    #[serde(default)]
    pub is_duplicate: bool,
}

impl Email {
    pub fn sender_domain(&self) -> Option<String> {
        DomainUtils::extract_domain(&self.from)
    }

    pub fn received_utc(&self) -> DateTime<Utc> {
        self.received_date_time.with_timezone(&Utc)
    }
}

// Raw payloads as handed over by the mail fetcher. Every field is optional;
// the classifier resolves missing values to empty defaults.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEmailAddress {
    pub address: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSender {
    pub email_address: Option<RawEmailAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFlag {
    pub flag_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAttachment {
    pub id: Option<String>,
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMessage {
    pub id: Option<String>,
    pub subject: Option<String>,
    pub from: Option<RawSender>,
    pub has_attachments: Option<bool>,
    pub received_date_time: Option<String>,
    pub categories: Option<Vec<String>>,
    pub is_read: Option<bool>,
    pub flag: Option<RawFlag>,
    pub body_preview: Option<String>,
    pub attachments: Option<Vec<RawAttachment>>,
}

impl RawMessage {
    pub fn new(sender: &str, subject: &str) -> Self {
        Self {
            subject: Some(subject.to_string()),
            from: Some(RawSender {
                email_address: Some(RawEmailAddress {
                    address: Some(sender.to_string()),
                    name: None,
                }),
            }),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_received(mut self, received: &str) -> Self {
        self.received_date_time = Some(received.to_string());
        self
    }

    pub fn with_attachment(mut self, attachment: RawAttachment) -> Self {
        self.has_attachments = Some(true);
        self.attachments.get_or_insert_with(Vec::new).push(attachment);
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body_preview = Some(body.to_string());
        self
    }

    pub fn sender_address(&self) -> &str {
        self.from
            .as_ref()
            .and_then(|f| f.email_address.as_ref())
            .and_then(|a| a.address.as_deref())
            .unwrap_or("")
    }

    pub fn is_flagged(&self) -> bool {
        self.flag
            .as_ref()
            .and_then(|f| f.flag_status.as_deref())
            .is_some_and(|status| status.eq_ignore_ascii_case("flagged"))
    }

    /// RFC 3339, or an ISO-8601 local timestamp read as UTC. Missing or
    /// unparseable timestamps fall back to the Unix epoch.
    pub fn received_at(&self) -> DateTime<FixedOffset> {
        let epoch = DateTime::<FixedOffset>::default();
        match self.received_date_time.as_deref() {
            Some(raw) => match parse_timestamp(raw.trim()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::warn!(
                        "Unparseable receivedDateTime {raw:?} on message {:?}: {e}",
                        self.id
                    );
                    epoch
                }
            },
            None => {
                log::warn!("Message {:?} has no receivedDateTime", self.id);
                epoch
            }
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).or_else(|e| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc().fixed_offset())
            .map_err(|_| e)
    })
}
