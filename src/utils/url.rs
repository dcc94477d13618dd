// src/utils/url.rs

//! URL manipulation utilities.

use regex::Regex;
use url::Url;

/// Extract the lowercase host from a URL.
///
/// # Examples
/// ```
/// use carfax_crawler::utils::url::get_host;
///
/// assert_eq!(
///     get_host("https://www.carfax.com/Used-Cars"),
///     Some("www.carfax.com".to_string())
/// );
/// ```
pub fn get_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

/// Whether `url`'s host is `expected` or one of its subdomains.
pub fn host_matches(url: &str, expected: &str) -> bool {
    let expected = expected.trim().trim_start_matches('.').to_lowercase();
    get_host(url).is_some_and(|host| host == expected || host.ends_with(&format!(".{expected}")))
}

/// Whether `url`'s path matches `pattern`.
pub fn path_matches(url: &str, pattern: &Regex) -> bool {
    Url::parse(url).is_ok_and(|u| pattern.is_match(u.path()))
}

/// The `page` query parameter, if present and numeric.
pub fn page_param(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

/// `url` with its `page` query parameter set to `page`; other parameters keep their order.
pub fn with_page(url: &str, page: u32) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("page", &page.to_string());
    Some(parsed.to_string())
}
