//! Identity and normalization of visited pages.
//!
//! A page is identified by a hash of its title, not its url, so the same
//! article reached through different links collapses into one entry.

use url::Url;

/// Maximum classifier/embedding input length (characters, not tokens)
const MAX_INPUT_LENGTH: usize = 512;

/// Ellipsis suffix when input is truncated
const TRUNCATION_SUFFIX: &str = "...";

/// Hostname of an absolute url, `None` if the url can't be parsed or has no host.
pub fn domain_of(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .map(|host| host.to_string()),
        Err(err) => {
            log::debug!("invalid url {url:?}: {err}");
            None
        }
    }
}

/// Text handed to the classifier and the embedder for a page.
///
/// Never fails: an invalid url degrades to a literal `null` domain.
pub fn classify_input(title: &str, url: &str) -> String {
    let domain = domain_of(url).unwrap_or_else(|| "null".to_string());
    truncate_input(&format!("title:{title} domain:{domain}"))
}

fn truncate_input(content: &str) -> String {
    if content.chars().count() <= MAX_INPUT_LENGTH {
        return content.to_string();
    }

    let max_chars = MAX_INPUT_LENGTH - TRUNCATION_SUFFIX.len();
    let truncated: String = content.chars().take(max_chars).collect();

    format!("{}{}", truncated, TRUNCATION_SUFFIX)
}

/// Stable 32-bit id of a title (djb2, xor variant).
///
/// Hashes UTF-16 code units so ids match the ones the browser extension
/// already wrote. Collisions are possible and accepted.
pub fn stable_id(title: &str) -> u32 {
    title
        .encode_utf16()
        .fold(5381u32, |hash, unit| hash.wrapping_mul(33) ^ unit as u32)
}
