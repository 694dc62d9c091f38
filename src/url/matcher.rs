/// Checks if a domain matches a wildcard pattern
///
/// Supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches "example.com" and any subdomain
///
/// # Examples
///
/// ```
/// use press_sieve::url::matches_wildcard;
///
/// assert!(matches_wildcard("36kr.com", "36kr.com"));
/// assert!(!matches_wildcard("36kr.com", "www.36kr.com"));
/// assert!(matches_wildcard("*.36kr.com", "www.36kr.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base
            || candidate
                .strip_suffix(base)
                .is_some_and(|prefix| prefix.ends_with('.'))
    } else {
        candidate == pattern
    }
}

/// An ordered set of domain patterns
#[derive(Debug, Clone, Default)]
pub struct DomainPatterns {
    patterns: Vec<String>,
}

impl DomainPatterns {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }

    /// Returns true if any pattern matches the (lowercase) domain
    pub fn matches(&self, domain: &str) -> bool {
        self.first_match(domain).is_some()
    }

    /// Returns the first pattern that matches the domain
    pub fn first_match(&self, domain: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| matches_wildcard(p, domain))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "blog.example.com"));
        assert!(!matches_wildcard("blog.example.com", "example.com"));
    }

    #[test]
    fn test_wildcard_matches_bare_and_nested() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "blog.example.com"));
        assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
    }

    #[test]
    fn test_wildcard_no_partial_match() {
        assert!(!matches_wildcard("*.example.com", "myexample.com"));
        assert!(!matches_wildcard("*.example.com", "example.com.org"));
        assert!(!matches_wildcard("*.example.com", ""));
    }

    #[test]
    fn test_domain_patterns_first_match() {
        let patterns = DomainPatterns::new(["36kr.com", "*.Spa-News.com"]);
        assert_eq!(patterns.len(), 2);
        assert!(patterns.matches("36kr.com"));
        assert_eq!(
            patterns.first_match("m.spa-news.com"),
            Some("*.spa-news.com")
        );
        assert!(!patterns.matches("example.com"));
        assert!(DomainPatterns::default().is_empty());
    }
}
