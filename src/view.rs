use crate::classifier::Classifier;
use crate::duplicates::detect_duplicates;
use crate::email::{Email, RawMessage};
use crate::filter::EmailFilter;
use crate::search::{SearchOptions, SearchQuery};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    ReceivedDateTime,
    Subject,
    From,
    Supplier,
    Channel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "receiveddatetime" | "received" | "date" => Ok(SortField::ReceivedDateTime),
            "subject" => Ok(SortField::Subject),
            "from" => Ok(SortField::From),
            "supplier" => Ok(SortField::Supplier),
            "channel" => Ok(SortField::Channel),
            other => anyhow::bail!("Unknown sort field: {other}"),
        }
    }
}

impl SortField {
    fn compare(&self, a: &Email, b: &Email) -> Ordering {
        match self {
            SortField::ReceivedDateTime => a.received_date_time.cmp(&b.received_date_time),
            SortField::Subject => a.subject.to_lowercase().cmp(&b.subject.to_lowercase()),
            SortField::From => a.from.to_lowercase().cmp(&b.from.to_lowercase()),
            SortField::Supplier => a.supplier.cmp(&b.supplier),
            SortField::Channel => a.channel.cmp(&b.channel),
        }
    }
}

/// Stable sort into a new list; equal keys keep their input order.
pub fn sort_emails(emails: &[Email], field: SortField, order: SortOrder) -> Vec<Email> {
    let mut sorted = emails.to_vec();
    sorted.sort_by(|a, b| match order {
        SortOrder::Asc => field.compare(a, b),
        SortOrder::Desc => field.compare(b, a),
    });
    sorted
}

/// Classify a fetched batch and mark duplicates within it.
pub fn ingest(classifier: &Classifier, raws: &[RawMessage]) -> Vec<Email> {
    let classified = classifier.classify_all(raws);
    let emails = detect_duplicates(&classified);
    log::info!("Ingested {} messages", emails.len());
    emails
}

/// What the caller currently wants to see: a filter and a search applied
/// independently and intersected, optionally sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MailboxView {
    pub filter: EmailFilter,
    pub search: SearchOptions,
    pub sort: Option<(SortField, SortOrder)>,
}

impl MailboxView {
    pub fn apply(&self, emails: &[Email]) -> Vec<Email> {
        self.apply_at(emails, Utc::now())
    }

    pub fn apply_at(&self, emails: &[Email], now: DateTime<Utc>) -> Vec<Email> {
        let query = SearchQuery::parse(&self.search.query, self.search.exact);

        let selected: Vec<Email> = emails
            .iter()
            .filter(|e| self.filter.matches(e, now))
            .filter(|e| match &query {
                Some(q) => q.matches(e, &self.search.fields),
                None => true,
            })
            .cloned()
            .collect();

        log::debug!("View selected {} of {} messages", selected.len(), emails.len());

        match self.sort {
            Some((field, order)) => sort_emails(&selected, field, order),
            None => selected,
        }
    }
}
