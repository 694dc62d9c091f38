use crate::UrlError;
use url::Url;

/// Click identifiers added by ad and mail platforms; `utm_*` is matched by prefix
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "gbraid", "wbraid", "msclkid", "yclid", "twclid", "igshid",
    "mc_cid", "mc_eid",
];

/// Canonicalises a feed entry URL so that trivially different links to the same
/// article share one URL fingerprint
///
/// # Canonicalisation
///
/// 1. Only http(s) URLs with a host are accepted
/// 2. The scheme becomes https
/// 3. The host is lowercased and a leading `www.` is dropped
/// 4. Dot segments, repeated slashes and a trailing slash are removed
/// 5. The fragment is dropped
/// 6. Tracking parameters (`utm_*` and click ids) are dropped, the rest sorted
///    and re-encoded
///
/// The canonical form is used for fingerprinting only; pages are always
/// fetched from the URL exactly as the feed published it.
///
/// # Examples
///
/// ```
/// use press_sieve::url::normalize_url;
///
/// let url = normalize_url("http://WWW.EXAMPLE.COM/news/42/?utm_source=rss#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/news/42");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "https" => {}
        "http" => url
            .set_scheme("https")
            .map_err(|_| UrlError::Malformed(format!("cannot rewrite scheme of {}", url_str)))?,
        other => {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                other
            )))
        }
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    // Default ports disappear with the scheme rewrite; explicit ones stay.
    if url.port() == Some(443) {
        url.set_port(None)
            .map_err(|_| UrlError::Malformed(format!("cannot clear port of {}", url_str)))?;
    }

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            // Re-encoded so that escaped separators inside values survive
            url.query_pairs_mut().clear().extend_pairs(params.iter());
        }
    }

    Ok(url)
}

/// Removes dot segments, empty segments and a trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
