/// Minimal sender-domain utilities
pub struct DomainUtils;

impl DomainUtils {
    /// Extract the lower-cased domain from an email address.
    /// Addresses without an `@`, or with nothing after it, have no domain.
    pub fn extract_domain(email: &str) -> Option<String> {
        email
            .split('@')
            .nth(1)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }

    /// Internal-sender test: the domain equals a listed domain or is one of
    /// its subdomains. `notpamediagroup.com` does not match `pamediagroup.com`.
    pub fn matches_domain_list(domain: &str, domain_list: &[String]) -> bool {
        let domain = domain.to_lowercase();
        domain_list
            .iter()
            .map(|listed| listed.trim().to_lowercase())
            .filter(|listed| !listed.is_empty())
            .any(|listed| {
                domain == listed
                    || domain
                        .strip_suffix(listed.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
    }

    /// Loose match used for supplier lookup: the sender domain only has to
    /// contain one of the listed domains.
    pub fn contains_any_domain(domain: &str, domain_list: &[String]) -> bool {
        let domain_lower = domain.to_lowercase();
        domain_list
            .iter()
            .filter(|pattern| !pattern.is_empty())
            .any(|pattern| domain_lower.contains(&pattern.to_lowercase()))
    }
}
