use crate::email::EmailType;
use anyhow::Context;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Classification tables and reporting settings.
///
/// Supplier and type tables are ordered: the first matching entry wins, so
/// they are lists rather than maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_type: EmailType,
    #[serde(default = "default_suppliers")]
    pub suppliers: Vec<SupplierRule>,
    #[serde(default = "default_type_rules")]
    pub types: Vec<TypeRule>,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierRule {
    pub name: String,
    pub domains: Vec<String>,
    /// Channel used when no keyword matches; the supplier name when unset
    #[serde(default)]
    pub default_channel: Option<String>,
    /// Checked in order against the lower-cased subject
    #[serde(default)]
    pub channels: Vec<ChannelRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRule {
    pub keyword: String,
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRule {
    #[serde(rename = "type")]
    pub email_type: EmailType,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Sender domains (and their subdomains) counted as internal
    pub internal_domains: Vec<String>,
    /// Offset of the reporting clock used for hour-of-day buckets
    pub utc_offset_minutes: i32,
    pub out_of_hours: OutOfHoursWindow,
}

/// Clock window, `HH:MM` on both ends, inclusive. A start later than the end
/// wraps past midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfHoursWindow {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_type: EmailType::Schedule,
            suppliers: default_suppliers(),
            types: default_type_rules(),
            statistics: StatisticsConfig::default(),
            logging: None,
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        StatisticsConfig {
            internal_domains: vec!["pamediagroup.com".to_string()],
            utc_offset_minutes: 0,
            out_of_hours: OutOfHoursWindow::default(),
        }
    }
}

impl Default for OutOfHoursWindow {
    fn default() -> Self {
        OutOfHoursWindow {
            start: "17:00".to_string(),
            end: "07:00".to_string(),
        }
    }
}

impl StatisticsConfig {
    /// Falls back to UTC when the configured offset is out of range.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}

impl OutOfHoursWindow {
    pub fn new(start: &str, end: &str) -> Self {
        OutOfHoursWindow {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    /// Both ends as minutes since midnight, `None` if either fails to parse.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        Some((parse_clock(&self.start)?, parse_clock(&self.end)?))
    }

    /// Parsed bounds, or the default window's when this one is invalid.
    /// Resolve once per pass; an invalid window warns on every call.
    pub fn resolve(&self) -> ClockWindow {
        let (start, end) = self.bounds().unwrap_or_else(|| {
            log::warn!(
                "Invalid out-of-hours window {}-{}, using default",
                self.start,
                self.end
            );
            (17 * 60, 7 * 60)
        });
        ClockWindow { start, end }
    }

    pub fn contains(&self, minute_of_day: u32) -> bool {
        self.resolve().contains(minute_of_day)
    }
}

/// Resolved window bounds in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockWindow {
    pub start: u32,
    pub end: u32,
}

impl ClockWindow {
    pub fn contains(&self, minute_of_day: u32) -> bool {
        if self.start > self.end {
            minute_of_day >= self.start || minute_of_day <= self.end
        } else {
            minute_of_day >= self.start && minute_of_day <= self.end
        }
    }
}

fn parse_clock(value: &str) -> Option<u32> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours < 24 && minutes < 60 {
        Some(hours * 60 + minutes)
    } else {
        None
    }
}

impl Config {
    /// Load from YAML, or TOML when the file has a `.toml` extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = if is_toml(path) {
            toml::from_str(&content)
                .with_context(|| format!("Invalid TOML config: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML config: {}", path.display()))?
        };
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Problems that would make classification misbehave. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();

        for supplier in &self.suppliers {
            if supplier.name.trim().is_empty() {
                problems.push("Supplier with empty name".to_string());
            } else if !seen.insert(supplier.name.as_str()) {
                problems.push(format!("Duplicate supplier: {}", supplier.name));
            }
            if supplier.domains.is_empty() {
                problems.push(format!("Supplier {} has no domains", supplier.name));
            }
            if supplier.domains.iter().any(|d| d.trim().is_empty()) {
                problems.push(format!("Supplier {} has an empty domain", supplier.name));
            }
            for rule in &supplier.channels {
                if rule.keyword.trim().is_empty() {
                    problems.push(format!(
                        "Supplier {} has an empty keyword for channel {}",
                        supplier.name, rule.channel
                    ));
                }
            }
        }

        for rule in &self.types {
            if rule.keywords.iter().any(|k| k.trim().is_empty()) {
                problems.push(format!("Type {} has an empty keyword", rule.email_type));
            }
        }

        if self.statistics.out_of_hours.bounds().is_none() {
            problems.push(format!(
                "Invalid out-of-hours window: {}-{}",
                self.statistics.out_of_hours.start, self.statistics.out_of_hours.end
            ));
        }
        if FixedOffset::east_opt(self.statistics.utc_offset_minutes.saturating_mul(60)).is_none()
        {
            problems.push(format!(
                "UTC offset out of range: {} minutes",
                self.statistics.utc_offset_minutes
            ));
        }

        problems
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

fn supplier(
    name: &str,
    domains: &[&str],
    channels: &[(&str, &str)],
    default_channel: Option<&str>,
) -> SupplierRule {
    SupplierRule {
        name: name.to_string(),
        domains: domains.iter().map(|d| d.to_string()).collect(),
        default_channel: default_channel.map(str::to_string),
        channels: channels
            .iter()
            .map(|(keyword, channel)| ChannelRule {
                keyword: keyword.to_string(),
                channel: channel.to_string(),
            })
            .collect(),
    }
}

fn default_suppliers() -> Vec<SupplierRule> {
    vec![
        supplier(
            "BBC",
            &["bbc.co.uk", "bbc.com"],
            &[
                ("cbbc", "CBBC"),
                ("cbeebies", "CBeebies"),
                ("bbc one", "BBC One"),
                ("bbc two", "BBC Two"),
                ("bbc three", "BBC Three"),
                ("bbc four", "BBC Four"),
                ("bbc news", "BBC News"),
                ("bbc parliament", "BBC Parliament"),
                ("bbc alba", "BBC Alba"),
                ("bbc scotland", "BBC Scotland"),
                ("world service", "BBC World Service"),
            ],
            None,
        ),
        supplier(
            "ITV",
            &["itv.com", "itv.co.uk"],
            &[
                ("itv2", "ITV2"),
                ("itv3", "ITV3"),
                ("itv4", "ITV4"),
                ("itvbe", "ITVBe"),
                ("citv", "CITV"),
            ],
            Some("ITV1"),
        ),
        supplier(
            "Channel 4",
            &["channel4.com", "c4.co.uk"],
            &[
                ("more4", "More4"),
                ("film4", "Film4"),
                ("4seven", "4seven"),
                ("e4", "E4"),
            ],
            Some("Channel 4"),
        ),
        supplier(
            "Sky",
            &["sky.com", "sky.uk"],
            &[
                ("sky sports", "Sky Sports"),
                ("sky news", "Sky News"),
                ("sky atlantic", "Sky Atlantic"),
                ("sky cinema", "Sky Cinema"),
                ("sky arts", "Sky Arts"),
            ],
            None,
        ),
        supplier(
            "UKTV",
            &["uktv.co.uk"],
            &[
                ("dave", "Dave"),
                ("alibi", "Alibi"),
                ("yesterday", "Yesterday"),
                ("drama", "Drama"),
                ("gold", "Gold"),
            ],
            Some("UKTV"),
        ),
        supplier(
            "Discovery",
            &["discovery.com", "discovery.co.uk"],
            &[
                ("quest red", "Quest Red"),
                ("quest", "Quest"),
                ("animal planet", "Animal Planet"),
                ("dmax", "DMAX"),
                ("tlc", "TLC"),
            ],
            Some("Discovery Channel"),
        ),
    ]
}

fn default_type_rules() -> Vec<TypeRule> {
    let rule = |email_type: EmailType, keywords: &[&str]| TypeRule {
        email_type,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    };

    vec![
        rule(
            EmailType::Update,
            &["update", "change", "urgent", "amendment"],
        ),
        rule(
            EmailType::Press,
            &["press", "news", "announcement", "programme information"],
        ),
        rule(
            EmailType::Technical,
            &["technical", "spec", "broadcast", "epg", "tasc"],
        ),
        rule(EmailType::Marketing, &["marketing", "promo", "trailer"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert_eq!(config.suppliers[0].name, "BBC");
        assert_eq!(config.types[0].email_type, EmailType::Update);
    }

    #[test]
    fn test_yaml_round_trip_keeps_table_order() {
        let path = std::env::temp_dir().join("broadcast-mail-triage-config-test.yaml");
        let config = Config::default();
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        let names: Vec<_> = loaded.suppliers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["BBC", "ITV", "Channel 4", "Sky", "UKTV", "Discovery"]
        );
        assert_eq!(loaded.statistics.out_of_hours, OutOfHoursWindow::default());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_toml_round_trip() {
        let path = std::env::temp_dir().join("broadcast-mail-triage-config-test.toml");
        let mut config = Config::default();
        config.statistics.utc_offset_minutes = 60;
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.statistics.utc_offset_minutes, 60);
        assert_eq!(loaded.suppliers.len(), config.suppliers.len());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
suppliers:
  - name: Example
    domains: ["example.com"]
statistics:
  internal_domains: ["example.org"]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.suppliers.len(), 1);
        assert!(config.suppliers[0].channels.is_empty());
        assert_eq!(config.types.len(), 4);
        assert_eq!(config.default_type, EmailType::Schedule);
        assert_eq!(config.statistics.out_of_hours.start, "17:00");
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut config = Config::default();
        config.suppliers.push(config.suppliers[0].clone());
        config.suppliers[1].domains.push(" ".to_string());
        config.statistics.out_of_hours = OutOfHoursWindow::new("25:00", "07:00");

        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("Duplicate supplier: BBC")));
        assert!(problems.iter().any(|p| p.contains("ITV has an empty domain")));
        assert!(problems.iter().any(|p| p.contains("out-of-hours")));
    }

    #[test]
    fn test_out_of_hours_window_wraps_midnight() {
        let window = OutOfHoursWindow::default();
        assert!(window.contains(17 * 60));
        assert!(window.contains(23 * 60 + 59));
        assert!(window.contains(0));
        assert!(window.contains(7 * 60));
        assert!(!window.contains(7 * 60 + 1));
        assert!(!window.contains(12 * 60));

        let daytime = OutOfHoursWindow::new("09:00", "17:30");
        assert!(daytime.contains(12 * 60));
        assert!(!daytime.contains(18 * 60));
    }

    #[test]
    fn test_invalid_window_resolves_to_default() {
        let invalid = OutOfHoursWindow::new("25:00", "07:00");
        assert_eq!(invalid.resolve(), OutOfHoursWindow::default().resolve());
        assert_eq!(
            invalid.resolve(),
            ClockWindow {
                start: 17 * 60,
                end: 7 * 60
            }
        );
        assert!(invalid.contains(23 * 60));
        assert!(!invalid.contains(12 * 60));
    }

    #[test]
    fn test_statistics_offset() {
        let mut stats = StatisticsConfig::default();
        assert_eq!(stats.offset().local_minus_utc(), 0);
        stats.utc_offset_minutes = -300;
        assert_eq!(stats.offset().local_minus_utc(), -300 * 60);
        stats.utc_offset_minutes = 100_000;
        assert_eq!(stats.offset().local_minus_utc(), 0);
    }
}
