use crate::email::Email;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

lazy_static! {
    static ref QUOTED_PHRASE: Regex = Regex::new(r#""([^"]+)""#).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Subject,
    From,
    Body,
    /// Field names from newer callers; always reads as empty
    #[serde(other)]
    Unrecognized,
}

impl SearchField {
    fn value<'a>(&self, email: &'a Email) -> &'a str {
        match self {
            SearchField::Subject => &email.subject,
            SearchField::From => &email.from,
            SearchField::Body => &email.body,
            SearchField::Unrecognized => "",
        }
    }
}

impl FromStr for SearchField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "subject" => Ok(SearchField::Subject),
            "from" => Ok(SearchField::From),
            "body" => Ok(SearchField::Body),
            other => anyhow::bail!("Unknown search field: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    pub query: String,
    #[serde(default = "default_fields")]
    pub fields: Vec<SearchField>,
    #[serde(default)]
    pub exact: bool,
}

fn default_fields() -> Vec<SearchField> {
    vec![SearchField::Subject, SearchField::From]
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            query: String::new(),
            fields: default_fields(),
            exact: false,
        }
    }
}

impl SearchOptions {
    pub fn new(query: &str, fields: &[SearchField]) -> Self {
        SearchOptions {
            query: query.to_string(),
            fields: fields.to_vec(),
            exact: false,
        }
    }

    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Positive {
    /// Exact mode: the whole clause as one substring
    Verbatim(String),
    /// Any one of the quoted phrases
    Phrases(Vec<String>),
    /// Every whitespace-separated term
    Terms(Vec<String>),
}

impl Positive {
    fn matches(&self, value: &str) -> bool {
        match self {
            Positive::Verbatim(clause) => value.contains(clause.as_str()),
            Positive::Phrases(phrases) => phrases.iter().any(|p| value.contains(p.as_str())),
            Positive::Terms(terms) => terms.iter().all(|t| value.contains(t.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Alternative {
    positive: Positive,
    // Plain substrings; quotes are not interpreted here
    excluded: Vec<String>,
}

/// A parsed query: `or` separates alternatives, `not` introduces excluded
/// terms within an alternative, and everything is case-insensitive.
///
/// This is split-based, not a grammar. Parentheses and nested quotes carry
/// no special meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    alternatives: Vec<Alternative>,
}

impl SearchQuery {
    /// `None` for a blank query, which matches everything.
    pub fn parse(query: &str, exact: bool) -> Option<Self> {
        if query.trim().is_empty() {
            return None;
        }

        let query = query.to_lowercase();
        let alternatives = query
            .split(" or ")
            .map(|part| {
                let mut segments = part.trim().split(" not ").map(str::trim);
                let clause = segments.next().unwrap_or_default();
                Alternative {
                    positive: parse_positive(clause, exact),
                    excluded: segments.map(str::to_string).collect(),
                }
            })
            .collect();

        Some(SearchQuery { alternatives })
    }

    pub fn matches(&self, email: &Email, fields: &[SearchField]) -> bool {
        let values: Vec<String> = fields
            .iter()
            .map(|f| f.value(email).to_lowercase())
            .collect();

        self.alternatives.iter().any(|alt| {
            let positive = values.iter().any(|v| alt.positive.matches(v));
            positive
                && !alt
                    .excluded
                    .iter()
                    .any(|term| values.iter().any(|v| v.contains(term.as_str())))
        })
    }
}

fn parse_positive(clause: &str, exact: bool) -> Positive {
    if exact {
        return Positive::Verbatim(clause.to_string());
    }

    if clause.contains('"') {
        // An unbalanced quote yields no phrases and therefore no match
        let phrases = QUOTED_PHRASE
            .captures_iter(clause)
            .map(|c| c[1].to_string())
            .collect();
        return Positive::Phrases(phrases);
    }

    Positive::Terms(clause.split_whitespace().map(str::to_string).collect())
}

/// Records matching `options.query` in any of `options.fields`, in input order.
pub fn search_emails(emails: &[Email], options: &SearchOptions) -> Vec<Email> {
    let Some(query) = SearchQuery::parse(&options.query, options.exact) else {
        return emails.to_vec();
    };

    let result: Vec<Email> = emails
        .iter()
        .filter(|e| query.matches(e, &options.fields))
        .cloned()
        .collect();
    log::debug!(
        "Search {:?} matched {} of {} messages",
        options.query,
        result.len(),
        emails.len()
    );
    result
}
