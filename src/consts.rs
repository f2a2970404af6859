//! Project-wide constants.

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");
pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// Bus topic the service listens on when none is specified.
pub const DEFAULT_TOPIC: &str = "wikipedia";

/// MediaWiki Action API endpoint.
pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";

/// Number of titles a geosearch returns unless configured otherwise.
pub const DEFAULT_GEO_RESULTS: u32 = 10;

/// Prefix of the topic a correlated response is published on.
pub const RESPONSE_TOPIC_PREFIX: &str = "tmp.";

/// Wikimedia asks every API client to identify itself.
pub fn user_agent() -> String {
    format!("wikibus/{} ({})", env!("CARGO_PKG_VERSION"), REPO)
}

/// Format a number with comma separators (e.g. 1,234,567).
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_small() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
    }

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(123_456), "123,456");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn consts_are_non_empty() {
        assert!(!AUTHOR.is_empty());
        assert!(!HOMEPAGE.is_empty());
        assert!(!REPO.is_empty());
        assert!(!DEFAULT_TOPIC.is_empty());
    }

    #[test]
    fn consts_from_cargo_toml() {
        assert!(AUTHOR.contains("Assaf Sapir"));
        assert!(REPO.contains("github.com/assapir/wikibus"));
    }

    #[test]
    fn user_agent_names_crate_and_repo() {
        let ua = user_agent();
        assert!(ua.starts_with("wikibus/"));
        assert!(ua.contains(REPO));
    }

    #[test]
    fn api_url_is_https() {
        assert!(DEFAULT_API_URL.starts_with("https://"));
    }
}
