use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use press_sieve::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses a URL string and returns its lowercase host
///
/// Returns `None` for unparseable URLs or URLs without a host.
pub fn domain_of(url_str: &str) -> Option<String> {
    Url::parse(url_str).ok().as_ref().and_then(extract_domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://mp.weixin.qq.com/s/abc").unwrap();
        assert_eq!(extract_domain(&url), Some("mp.weixin.qq.com".to_string()));
    }

    #[test]
    fn test_extract_ignores_port_and_case() {
        let url = Url::parse("https://News.Example.COM:8080/a?b=c#d").unwrap();
        assert_eq!(extract_domain(&url), Some("news.example.com".to_string()));
    }

    #[test]
    fn test_domain_of_string() {
        assert_eq!(
            domain_of("https://36kr.com/p/123"),
            Some("36kr.com".to_string())
        );
        assert_eq!(domain_of("not a url"), None);
        assert_eq!(domain_of("mailto:editor@example.com"), None);
    }
}
