use crate::config::StatisticsConfig;
use crate::domain_utils::DomainUtils;
use crate::email::{Email, EmailType};
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Length of the trailing `daily_volume` window, today included
pub const DAILY_VOLUME_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVolume {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyCount {
    pub hour: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalExternalRatio {
    pub internal: usize,
    pub external: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStats {
    pub total_emails: usize,
    pub supplier_distribution: BTreeMap<String, usize>,
    pub type_distribution: BTreeMap<EmailType, usize>,
    pub attachment_count: usize,
    /// Oldest first, zero-filled
    pub daily_volume: Vec<DailyVolume>,
    /// Always 24 entries, hour 0 first
    pub peak_times: Vec<HourlyCount>,
    pub internal_vs_external_ratio: InternalExternalRatio,
}

impl EmailStats {
    /// Share of all messages in percent; 0 when there are no messages.
    pub fn percentage_of_total(&self, count: usize) -> f64 {
        percentage(count, self.total_emails)
    }
}

pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

pub fn calculate_email_stats(emails: &[Email], config: &StatisticsConfig) -> EmailStats {
    calculate_email_stats_at(emails, config, Utc::now())
}

/// Like [`calculate_email_stats`], with "today" taken from `now`.
pub fn calculate_email_stats_at(
    emails: &[Email],
    config: &StatisticsConfig,
    now: DateTime<Utc>,
) -> EmailStats {
    let offset = config.offset();

    let mut supplier_distribution = BTreeMap::new();
    let mut type_distribution = BTreeMap::new();
    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    let mut peak_counts = [0usize; 24];
    let mut ratio = InternalExternalRatio::default();
    let mut attachment_count = 0;

    for email in emails {
        *supplier_distribution
            .entry(email.supplier.clone())
            .or_insert(0) += 1;
        *type_distribution.entry(email.email_type).or_insert(0) += 1;

        if email.has_attachments {
            attachment_count += 1;
        }

        *per_day
            .entry(email.received_utc().date_naive())
            .or_insert(0) += 1;

        let local_hour = email.received_date_time.with_timezone(&offset).hour();
        peak_counts[local_hour as usize] += 1;

        let internal = email
            .sender_domain()
            .is_some_and(|d| DomainUtils::matches_domain_list(&d, &config.internal_domains));
        if internal {
            ratio.internal += 1;
        } else {
            ratio.external += 1;
        }
    }

    let today = now.date_naive();
    let daily_volume = (0..DAILY_VOLUME_DAYS)
        .rev()
        .map(|days_ago| {
            let date = today - Duration::days(days_ago);
            DailyVolume {
                date,
                count: per_day.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();

    EmailStats {
        total_emails: emails.len(),
        supplier_distribution,
        type_distribution,
        attachment_count,
        daily_volume,
        peak_times: hourly(peak_counts),
        internal_vs_external_ratio: ratio,
    }
}

fn hourly(counts: [usize; 24]) -> Vec<HourlyCount> {
    counts
        .iter()
        .enumerate()
        .map(|(hour, &count)| HourlyCount {
            hour: hour as u32,
            count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutOfHoursBreakdown {
    pub business_hours: usize,
    pub out_of_hours: usize,
    pub business_hours_percentage: f64,
    pub out_of_hours_percentage: f64,
    /// Out-of-hours messages only, by local hour
    pub hourly: Vec<HourlyCount>,
}

/// Split messages by whether they arrived inside the configured
/// out-of-hours window on the reporting clock.
pub fn out_of_hours_breakdown(emails: &[Email], config: &StatisticsConfig) -> OutOfHoursBreakdown {
    let offset = config.offset();
    let window = config.out_of_hours.resolve();
    let mut hourly_counts = [0usize; 24];
    let mut out_of_hours = 0;

    for email in emails {
        let local = email.received_date_time.with_timezone(&offset);
        if window.contains(local.hour() * 60 + local.minute()) {
            out_of_hours += 1;
            hourly_counts[local.hour() as usize] += 1;
        }
    }

    let business_hours = emails.len() - out_of_hours;
    OutOfHoursBreakdown {
        business_hours,
        out_of_hours,
        business_hours_percentage: percentage(business_hours, emails.len()),
        out_of_hours_percentage: percentage(out_of_hours, emails.len()),
        hourly: hourly(hourly_counts),
    }
}
