use crate::email::Email;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    // A single reply/forward prefix, plus the whitespace after it
    static ref REPLY_PREFIX: Regex = Regex::new(r"^(?:re|fwd?):\s*").unwrap();
}

/// Lower-cases the subject, strips one leading `re:`/`fwd:`/`fw:` prefix and
/// collapses whitespace. Prefixes are not peeled recursively.
pub fn normalize_subject(subject: &str) -> String {
    let lower = subject.to_lowercase();
    let stripped = REPLY_PREFIX.replace(&lower, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Records sharing this key are near-duplicates of each other.
pub fn similarity_key(email: &Email) -> (String, String) {
    (email.from.clone(), normalize_subject(&email.subject))
}

/// Returns a copy of `emails` in the same order with `is_duplicate` set.
///
/// Within each similarity group the earliest `received_date_time` stays the
/// canonical record; ties keep the first one seen in the input.
pub fn detect_duplicates(emails: &[Email]) -> Vec<Email> {
    let mut groups: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (index, email) in emails.iter().enumerate() {
        groups.entry(similarity_key(email)).or_default().push(index);
    }

    let mut flags = vec![false; emails.len()];
    for members in groups.values_mut().filter(|members| members.len() > 1) {
        members.sort_by_key(|&index| emails[index].received_date_time);
        for &index in members.iter().skip(1) {
            flags[index] = true;
        }
    }

    let duplicates = flags.iter().filter(|&&flag| flag).count();
    if duplicates > 0 {
        log::info!(
            "Marked {duplicates} of {} messages as duplicates",
            emails.len()
        );
    }

    emails
        .iter()
        .zip(flags)
        .map(|(email, is_duplicate)| Email {
            is_duplicate,
            ..email.clone()
        })
        .collect()
}
