use crate::email::{Email, EmailType};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Relative windows measured back from the evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFilter {
    #[serde(rename = "last30min")]
    Last30Minutes,
    #[serde(rename = "last1hour")]
    LastHour,
    #[serde(rename = "last3hours")]
    Last3Hours,
    #[serde(rename = "last6hours")]
    Last6Hours,
    #[serde(rename = "last12hours")]
    Last12Hours,
    #[serde(rename = "last24hours")]
    Last24Hours,
    /// Values from newer callers; imposes no constraint
    #[serde(other)]
    Unrecognized,
}

impl TimeFilter {
    pub fn window(&self) -> Option<Duration> {
        let minutes = match self {
            TimeFilter::Last30Minutes => 30,
            TimeFilter::LastHour => 60,
            TimeFilter::Last3Hours => 180,
            TimeFilter::Last6Hours => 360,
            TimeFilter::Last12Hours => 720,
            TimeFilter::Last24Hours => 1440,
            TimeFilter::Unrecognized => return None,
        };
        Some(Duration::minutes(minutes))
    }
}

impl FromStr for TimeFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "last30min" => TimeFilter::Last30Minutes,
            "last1hour" => TimeFilter::LastHour,
            "last3hours" => TimeFilter::Last3Hours,
            "last6hours" => TimeFilter::Last6Hours,
            "last12hours" => TimeFilter::Last12Hours,
            "last24hours" => TimeFilter::Last24Hours,
            other => {
                log::warn!("Unrecognized time filter {other:?}, ignoring");
                TimeFilter::Unrecognized
            }
        })
    }
}

/// Inclusive bounds; a missing side is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRange {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

impl DateRange {
    pub fn contains(&self, at: &DateTime<FixedOffset>) -> bool {
        if self.start.as_ref().is_some_and(|start| at < start) {
            return false;
        }
        if self.end.as_ref().is_some_and(|end| at > end) {
            return false;
        }
        true
    }
}

/// Structured predicate. Every set field must hold; unset fields, empty
/// strings and empty category lists impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailFilter {
    pub supplier: Option<String>,
    pub channel: Option<String>,
    /// An unknown type name deserializes to `None`
    #[serde(rename = "type", deserialize_with = "lenient_email_type")]
    pub email_type: Option<EmailType>,
    pub has_attachments: Option<bool>,
    pub date_range: Option<DateRange>,
    /// Passes when the record shares at least one category
    pub categories: Option<Vec<String>>,
    pub time_filter: Option<TimeFilter>,
    pub show_duplicates_only: bool,
}

impl EmailFilter {
    pub fn is_empty(&self) -> bool {
        *self == EmailFilter::default()
    }

    /// Combine two filters, fields set in `other` taking precedence.
    pub fn merge(&self, other: &EmailFilter) -> EmailFilter {
        EmailFilter {
            supplier: other.supplier.clone().or_else(|| self.supplier.clone()),
            channel: other.channel.clone().or_else(|| self.channel.clone()),
            email_type: other.email_type.or(self.email_type),
            has_attachments: other.has_attachments.or(self.has_attachments),
            date_range: other
                .date_range
                .clone()
                .or_else(|| self.date_range.clone()),
            categories: other
                .categories
                .clone()
                .or_else(|| self.categories.clone()),
            time_filter: other.time_filter.or(self.time_filter),
            show_duplicates_only: self.show_duplicates_only || other.show_duplicates_only,
        }
    }

    pub fn matches(&self, email: &Email, now: DateTime<Utc>) -> bool {
        if let Some(supplier) = non_empty(&self.supplier) {
            if email.supplier != supplier {
                return false;
            }
        }

        if let Some(channel) = non_empty(&self.channel) {
            if email.channel != channel {
                return false;
            }
        }

        if let Some(email_type) = self.email_type {
            if email.email_type != email_type {
                return false;
            }
        }

        if let Some(has_attachments) = self.has_attachments {
            if email.has_attachments != has_attachments {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            if !range.contains(&email.received_date_time) {
                return false;
            }
        }

        if let Some(categories) = self.categories.as_ref().filter(|c| !c.is_empty()) {
            if !categories.iter().any(|c| email.categories.contains(c)) {
                return false;
            }
        }

        if let Some(window) = self.time_filter.and_then(|t| t.window()) {
            if email.received_utc() < now - window {
                return false;
            }
        }

        if self.show_duplicates_only && !email.is_duplicate {
            return false;
        }

        true
    }
}

fn lenient_email_type<'de, D>(deserializer: D) -> Result<Option<EmailType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|name| match name.parse::<EmailType>() {
        Ok(email_type) => Some(email_type),
        Err(_) => {
            log::warn!("Unrecognized email type {name:?} in filter, ignoring");
            None
        }
    }))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Applies an [`EmailFilter`] against a fixed evaluation time.
pub struct FilterEngine {
    filter: EmailFilter,
    now: DateTime<Utc>,
}

impl FilterEngine {
    pub fn new(filter: EmailFilter) -> Self {
        Self::at(filter, Utc::now())
    }

    /// Evaluate relative time windows against `now` instead of the wall clock.
    pub fn at(filter: EmailFilter, now: DateTime<Utc>) -> Self {
        FilterEngine { filter, now }
    }

    pub fn matches(&self, email: &Email) -> bool {
        self.filter.matches(email, self.now)
    }

    /// Matching records in input order. The input is left untouched.
    pub fn apply(&self, emails: &[Email]) -> Vec<Email> {
        if self.filter.is_empty() {
            return emails.to_vec();
        }

        let result: Vec<Email> = emails.iter().filter(|e| self.matches(e)).cloned().collect();
        log::debug!("Filter kept {} of {} messages", result.len(), emails.len());
        result
    }
}

pub fn filter_emails(emails: &[Email], filter: &EmailFilter) -> Vec<Email> {
    FilterEngine::new(filter.clone()).apply(emails)
}

pub fn filter_emails_at(emails: &[Email], filter: &EmailFilter, now: DateTime<Utc>) -> Vec<Email> {
    FilterEngine::at(filter.clone(), now).apply(emails)
}
