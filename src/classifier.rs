use crate::config::{Config, SupplierRule};
use crate::domain_utils::DomainUtils;
use crate::email::{Attachment, Email, EmailType, RawAttachment, RawMessage};

pub const UNKNOWN_SUPPLIER: &str = "Unknown";

struct CompiledSupplier {
    name: String,
    domains: Vec<String>,
    channels: Vec<(String, String)>,
    default_channel: String,
}

/// Maps raw payloads onto normalized `{supplier, channel, type}` records
/// using the tables from [`Config`].
pub struct Classifier {
    suppliers: Vec<CompiledSupplier>,
    type_rules: Vec<(EmailType, Vec<String>)>,
    default_type: EmailType,
}

impl Classifier {
    pub fn new(config: &Config) -> Self {
        let suppliers = config.suppliers.iter().map(compile_supplier).collect();

        let type_rules = config
            .types
            .iter()
            .map(|rule| (rule.email_type, lowercase_keywords(&rule.keywords)))
            .collect();

        Classifier {
            suppliers,
            type_rules,
            default_type: config.default_type,
        }
    }

    pub fn classify(&self, raw: &RawMessage) -> Email {
        let from = raw.sender_address().to_string();
        let subject = raw.subject.clone().unwrap_or_default();

        let supplier = self.identify_supplier(&from);
        let channel = self.identify_channel(&subject, &supplier);
        let email_type = self.identify_type(&subject);

        let has_attachments = raw.has_attachments.unwrap_or(false);
        let attachments = match (&raw.attachments, has_attachments) {
            (Some(attachments), true) => transform_attachments(attachments),
            _ => Vec::new(),
        };

        log::debug!(
            "Classified {:?} from {from}: supplier={supplier} channel={channel} type={email_type}",
            subject
        );

        Email {
            id: raw.id.clone().unwrap_or_default(),
            subject,
            from,
            body: raw.body_preview.clone().unwrap_or_default(),
            supplier,
            channel,
            email_type,
            has_attachments,
            attachments,
            received_date_time: raw.received_at(),
            categories: raw.categories.clone().unwrap_or_default(),
            is_read: raw.is_read.unwrap_or(false),
            is_flagged: raw.is_flagged(),
            is_duplicate: false,
        }
    }

    pub fn classify_all(&self, raws: &[RawMessage]) -> Vec<Email> {
        raws.iter().map(|raw| self.classify(raw)).collect()
    }

    /// First supplier with a domain contained in the sender's domain.
    pub fn identify_supplier(&self, sender: &str) -> String {
        let Some(domain) = DomainUtils::extract_domain(sender) else {
            log::debug!("No domain in sender address {sender:?}");
            return UNKNOWN_SUPPLIER.to_string();
        };

        self.suppliers
            .iter()
            .find(|s| DomainUtils::contains_any_domain(&domain, &s.domains))
            .map(|s| s.name.clone())
            .unwrap_or_else(|| UNKNOWN_SUPPLIER.to_string())
    }

    pub fn identify_channel(&self, subject: &str, supplier: &str) -> String {
        let Some(rules) = self.suppliers.iter().find(|s| s.name == supplier) else {
            return supplier.to_string();
        };

        let subject = subject.to_lowercase();
        rules
            .channels
            .iter()
            .find(|(keyword, _)| subject.contains(keyword.as_str()))
            .map(|(_, channel)| channel.clone())
            .unwrap_or_else(|| rules.default_channel.clone())
    }

    /// Rules are checked in table order; a subject matching several types
    /// takes the earliest one.
    pub fn identify_type(&self, subject: &str) -> EmailType {
        let subject = subject.to_lowercase();
        self.type_rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| subject.contains(k.as_str())))
            .map(|(email_type, _)| *email_type)
            .unwrap_or(self.default_type)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::new(&Config::default())
    }
}

pub fn transform_attachments(raw: &[RawAttachment]) -> Vec<Attachment> {
    raw.iter()
        .map(|a| Attachment {
            id: a.id.clone().unwrap_or_default(),
            name: a.name.clone().unwrap_or_default(),
            content_type: a.content_type.clone().unwrap_or_default(),
            size: a.size.unwrap_or(0),
        })
        .collect()
}

fn compile_supplier(rule: &SupplierRule) -> CompiledSupplier {
    let domains = lowercase_keywords(&rule.domains);
    if domains.len() != rule.domains.len() {
        log::warn!("Ignoring empty domain entries for supplier {}", rule.name);
    }

    CompiledSupplier {
        name: rule.name.clone(),
        domains,
        channels: rule
            .channels
            .iter()
            .filter(|c| !c.keyword.trim().is_empty())
            .map(|c| (c.keyword.to_lowercase(), c.channel.clone()))
            .collect(),
        default_channel: rule
            .default_channel
            .clone()
            .unwrap_or_else(|| rule.name.clone()),
    }
}

// Empty keywords would match every subject.
fn lowercase_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelRule, TypeRule};

    #[test]
    fn test_identify_supplier() {
        let classifier = Classifier::default();
        assert_eq!(classifier.identify_supplier("test@bbc.co.uk"), "BBC");
        assert_eq!(classifier.identify_supplier("test@itv.com"), "ITV");
        assert_eq!(classifier.identify_supplier("test@sky.com"), "Sky");
        assert_eq!(classifier.identify_supplier("press@mail.bbc.com"), "BBC");
        assert_eq!(classifier.identify_supplier("test@unknown.com"), "Unknown");
        assert_eq!(classifier.identify_supplier("invalid-email"), "Unknown");
        assert_eq!(classifier.identify_supplier(""), "Unknown");
    }

    #[test]
    fn test_identify_bbc_channels() {
        let classifier = Classifier::default();
        assert_eq!(classifier.identify_channel("BBC One Schedule", "BBC"), "BBC One");
        assert_eq!(classifier.identify_channel("BBC Two Update", "BBC"), "BBC Two");
        assert_eq!(
            classifier.identify_channel("BBC Three Programme", "BBC"),
            "BBC Three"
        );
        assert_eq!(classifier.identify_channel("CBBC Schedule", "BBC"), "CBBC");
        assert_eq!(classifier.identify_channel("BBC News Update", "BBC"), "BBC News");
        assert_eq!(classifier.identify_channel("Unknown Channel", "BBC"), "BBC");
    }

    #[test]
    fn test_identify_itv_and_sky_channels() {
        let classifier = Classifier::default();
        assert_eq!(classifier.identify_channel("ITV2 Schedule", "ITV"), "ITV2");
        assert_eq!(classifier.identify_channel("ITV3 Update", "ITV"), "ITV3");
        assert_eq!(classifier.identify_channel("CITV Programme", "ITV"), "CITV");
        assert_eq!(classifier.identify_channel("General ITV Update", "ITV"), "ITV1");
        assert_eq!(classifier.identify_channel("Random Subject", "ITV"), "ITV1");
        assert_eq!(
            classifier.identify_channel("Sky Sports Schedule", "Sky"),
            "Sky Sports"
        );
        assert_eq!(classifier.identify_channel("Sky News Update", "Sky"), "Sky News");
        assert_eq!(classifier.identify_channel("General Sky Update", "Sky"), "Sky");
    }

    #[test]
    fn test_unknown_supplier_channel_is_supplier_name() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.identify_channel("BBC One Schedule", UNKNOWN_SUPPLIER),
            "Unknown"
        );
    }

    #[test]
    fn test_identify_type_priority() {
        let classifier = Classifier::default();
        assert_eq!(classifier.identify_type("Schedule Update"), EmailType::Update);
        assert_eq!(classifier.identify_type("Urgent Change"), EmailType::Update);
        assert_eq!(
            classifier.identify_type("Last Minute Amendment"),
            EmailType::Update
        );
        assert_eq!(
            classifier.identify_type("Final Billing Updated"),
            EmailType::Update
        );
        assert_eq!(classifier.identify_type("Press Release"), EmailType::Press);
        assert_eq!(classifier.identify_type("News Announcement"), EmailType::Press);
        assert_eq!(
            classifier.identify_type("Programme Information"),
            EmailType::Press
        );
        assert_eq!(
            classifier.identify_type("Technical Specification"),
            EmailType::Technical
        );
        assert_eq!(
            classifier.identify_type("Broadcast Information"),
            EmailType::Technical
        );
        assert_eq!(classifier.identify_type("EPG Data"), EmailType::Technical);
        assert_eq!(classifier.identify_type("Sent to TASC"), EmailType::Technical);
        assert_eq!(
            classifier.identify_type("Marketing Campaign"),
            EmailType::Marketing
        );
        assert_eq!(classifier.identify_type("Promo Material"), EmailType::Marketing);
        assert_eq!(classifier.identify_type("Weekly Schedule"), EmailType::Schedule);
        assert_eq!(classifier.identify_type("Monday Programme"), EmailType::Schedule);
        assert_eq!(classifier.identify_type("Random Subject"), EmailType::Schedule);

        // update is checked before press
        assert_eq!(classifier.identify_type("News Update"), EmailType::Update);
    }

    #[test]
    fn test_classify_bbc_one_schedule() {
        let classifier = Classifier::default();
        let raw = RawMessage::new("x@bbc.co.uk", "BBC One Schedule")
            .with_id("1")
            .with_received("2024-01-01T10:30:00Z");

        let email = classifier.classify(&raw);
        assert_eq!(email.supplier, "BBC");
        assert_eq!(email.channel, "BBC One");
        assert_eq!(email.email_type, EmailType::Schedule);
        assert!(!email.is_duplicate);
    }

    #[test]
    fn test_classify_full_payload() {
        let json = r#"{
            "id": "graph-id-123",
            "subject": "Test Subject",
            "from": { "emailAddress": { "address": "test@bbc.co.uk" } },
            "hasAttachments": true,
            "receivedDateTime": "2024-01-01T10:30:00Z",
            "categories": ["urgent"],
            "isRead": false,
            "flag": { "flagStatus": "flagged" },
            "bodyPreview": "Test body preview",
            "attachments": [
                { "id": "att-1", "name": "test.pdf", "contentType": "application/pdf", "size": 1024 }
            ]
        }"#;
        let raw: RawMessage = serde_json::from_str(json).unwrap();
        let email = Classifier::default().classify(&raw);

        assert_eq!(email.id, "graph-id-123");
        assert_eq!(email.from, "test@bbc.co.uk");
        assert_eq!(email.supplier, "BBC");
        assert!(email.has_attachments);
        assert_eq!(email.categories, vec!["urgent".to_string()]);
        assert!(email.is_flagged);
        assert_eq!(email.body, "Test body preview");
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].content_type, "application/pdf");
    }

    #[test]
    fn test_classify_missing_fields() {
        let raw: RawMessage = serde_json::from_str(r#"{"id": "graph-id-123"}"#).unwrap();
        let email = Classifier::default().classify(&raw);

        assert_eq!(email.id, "graph-id-123");
        assert_eq!(email.subject, "");
        assert_eq!(email.from, "");
        assert_eq!(email.supplier, "Unknown");
        assert_eq!(email.channel, "Unknown");
        assert_eq!(email.email_type, EmailType::Schedule);
        assert!(!email.has_attachments);
        assert!(email.attachments.is_empty());
        assert!(email.categories.is_empty());
        assert!(!email.is_read);
        assert!(!email.is_flagged);
        assert_eq!(email.body, "");
    }

    #[test]
    fn test_attachments_ignored_without_flag() {
        let mut raw = RawMessage::new("a@itv.com", "ITV2 promo").with_attachment(RawAttachment {
            id: Some("att".to_string()),
            ..Default::default()
        });
        raw.has_attachments = Some(false);

        let email = Classifier::default().classify(&raw);
        assert!(!email.has_attachments);
        assert!(email.attachments.is_empty());
        assert_eq!(email.email_type, EmailType::Marketing);
    }

    #[test]
    fn test_transform_attachments() {
        let raw = vec![
            RawAttachment {
                id: Some("att-1".to_string()),
                name: Some("document.pdf".to_string()),
                content_type: Some("application/pdf".to_string()),
                size: Some(1024),
            },
            RawAttachment::default(),
        ];

        let attachments = transform_attachments(&raw);
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].name, "document.pdf");
        assert_eq!(attachments[0].size, 1024);
        assert_eq!(attachments[1].id, "");
        assert!(transform_attachments(&[]).is_empty());
    }

    #[test]
    fn test_synthetic_tables() {
        let config = Config {
            suppliers: vec![SupplierRule {
                name: "Acme".to_string(),
                domains: vec!["acme.test".to_string(), "".to_string()],
                default_channel: Some("Acme Main".to_string()),
                channels: vec![
                    ChannelRule {
                        keyword: "acme plus".to_string(),
                        channel: "Acme+".to_string(),
                    },
                    ChannelRule {
                        keyword: "acme".to_string(),
                        channel: "Acme Generic".to_string(),
                    },
                ],
            }],
            types: vec![TypeRule {
                email_type: EmailType::Technical,
                keywords: vec!["ACME".to_string()],
            }],
            default_type: EmailType::Press,
            ..Default::default()
        };
        let classifier = Classifier::new(&config);

        // the empty domain entry must not match everything
        assert_eq!(classifier.identify_supplier("x@other.test"), "Unknown");
        assert_eq!(classifier.identify_supplier("x@mail.acme.test"), "Acme");
        assert_eq!(classifier.identify_channel("ACME Plus listings", "Acme"), "Acme+");
        assert_eq!(classifier.identify_channel("acme today", "Acme"), "Acme Generic");
        assert_eq!(classifier.identify_channel("listings", "Acme"), "Acme Main");
        assert_eq!(classifier.identify_type("acme listings"), EmailType::Technical);
        assert_eq!(classifier.identify_type("listings"), EmailType::Press);
    }
}
