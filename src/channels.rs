use crate::email::Email;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStat {
    pub channel: String,
    /// Supplier of the first message seen on this channel
    pub supplier: String,
    pub count: usize,
    pub last_received: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSort {
    #[default]
    Count,
    Name,
    Supplier,
}

impl FromStr for ChannelSort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(ChannelSort::Count),
            "name" => Ok(ChannelSort::Name),
            "supplier" => Ok(ChannelSort::Supplier),
            other => anyhow::bail!("Unknown channel sort: {other}"),
        }
    }
}

/// Distinct channel names, sorted.
pub fn unique_channels(emails: &[Email]) -> Vec<String> {
    emails
        .iter()
        .map(|e| e.channel.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Channels seen per supplier, both levels sorted by name.
pub fn channels_by_supplier(emails: &[Email]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for email in emails {
        grouped
            .entry(email.supplier.clone())
            .or_default()
            .insert(email.channel.clone());
    }

    grouped
        .into_iter()
        .map(|(supplier, channels)| (supplier, channels.into_iter().collect()))
        .collect()
}

pub fn channel_stats(emails: &[Email], sort: ChannelSort) -> Vec<ChannelStat> {
    let mut by_channel: HashMap<&str, ChannelStat> = HashMap::new();

    for email in emails {
        by_channel
            .entry(email.channel.as_str())
            .and_modify(|stat| {
                stat.count += 1;
                if email.received_date_time > stat.last_received {
                    stat.last_received = email.received_date_time;
                }
            })
            .or_insert_with(|| ChannelStat {
                channel: email.channel.clone(),
                supplier: email.supplier.clone(),
                count: 1,
                last_received: email.received_date_time,
            });
    }

    let mut stats: Vec<ChannelStat> = by_channel.into_values().collect();
    match sort {
        ChannelSort::Count => stats.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.channel.cmp(&b.channel))
        }),
        ChannelSort::Name => stats.sort_by(|a, b| a.channel.cmp(&b.channel)),
        ChannelSort::Supplier => stats.sort_by(|a, b| {
            a.supplier
                .cmp(&b.supplier)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a.channel.cmp(&b.channel))
        }),
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::email::RawMessage;

    fn sample_emails() -> Vec<Email> {
        let classifier = Classifier::default();
        let raws = vec![
            RawMessage::new("a@bbc.co.uk", "BBC One Schedule").with_received("2024-01-01T10:30:00Z"),
            RawMessage::new("a@bbc.co.uk", "BBC One Update").with_received("2024-01-02T10:30:00Z"),
            RawMessage::new("b@itv.com", "ITV News").with_received("2024-01-02T14:45:00Z"),
            RawMessage::new("c@sky.com", "Sky Sports Schedule").with_received("2024-01-03T09:15:00Z"),
            RawMessage::new("c@sky.com", "Sky News tonight").with_received("2024-01-03T09:20:00Z"),
            RawMessage::new("c@sky.com", "Sky News late").with_received("2024-01-01T09:20:00Z"),
        ];
        classifier.classify_all(&raws)
    }

    #[test]
    fn test_unique_channels() {
        let mut emails = sample_emails();
        emails.push(emails[0].clone());
        assert_eq!(
            unique_channels(&emails),
            vec!["BBC One", "ITV1", "Sky News", "Sky Sports"]
        );
        assert!(unique_channels(&[]).is_empty());
    }

    #[test]
    fn test_channels_by_supplier() {
        let grouped = channels_by_supplier(&sample_emails());
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped["Sky"], vec!["Sky News", "Sky Sports"]);
        assert_eq!(grouped["BBC"], vec!["BBC One"]);
    }

    #[test]
    fn test_channel_stats_by_count() {
        let stats = channel_stats(&sample_emails(), ChannelSort::Count);
        let order: Vec<(&str, usize)> = stats
            .iter()
            .map(|s| (s.channel.as_str(), s.count))
            .collect();
        assert_eq!(
            order,
            vec![("BBC One", 2), ("Sky News", 2), ("ITV1", 1), ("Sky Sports", 1)]
        );

        let sky_news = &stats[1];
        assert_eq!(sky_news.supplier, "Sky");
        assert_eq!(sky_news.last_received.to_rfc3339(), "2024-01-03T09:20:00+00:00");
    }

    #[test]
    fn test_channel_stats_by_supplier_and_name() {
        let emails = sample_emails();

        let by_supplier: Vec<String> = channel_stats(&emails, ChannelSort::Supplier)
            .into_iter()
            .map(|s| s.channel)
            .collect();
        assert_eq!(by_supplier, vec!["BBC One", "ITV1", "Sky News", "Sky Sports"]);

        let by_name: Vec<String> = channel_stats(&emails, ChannelSort::Name)
            .into_iter()
            .map(|s| s.channel)
            .collect();
        assert_eq!(by_name, vec!["BBC One", "ITV1", "Sky News", "Sky Sports"]);
        assert!(channel_stats(&[], ChannelSort::Count).is_empty());
    }
}
