//! Small helpers shared by the scrapers and the pipeline.
//!
//! - Domain extraction used as the adapter dispatch key
//! - Whitespace normalisation for text pulled out of HTML
//! - Truncation of long strings before they hit the logs

use url::Url;

/// Extract the host of a URL, the key used to pick an adapter.
///
/// The port is kept when present so that `http://localhost:8081/news` and
/// `http://localhost:8082/news` can dispatch to different adapters.
///
/// # Returns
///
/// `None` if the string is not an absolute URL with a host.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(domain_of("https://ru.investing.com/news/").as_deref(), Some("ru.investing.com"));
/// assert_eq!(domain_of("not a url"), None);
/// ```
pub fn domain_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Collapse runs of whitespace (including non-breaking spaces) into single
/// spaces and trim the ends.
pub fn squash_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary no later than `max` bytes,
/// with an ellipsis and the number of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}
