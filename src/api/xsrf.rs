//! Anti-forgery token extraction from `Set-Cookie` headers

use std::sync::OnceLock;

use regex::Regex;

/// Header the refresh endpoint expects the token in
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

const XSRF_COOKIE: &str = "XSRF-TOKEN=";

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"XSRF-TOKEN=([^;]+)").expect("valid XSRF pattern"))
}

/// Finds the `XSRF-TOKEN` cookie among `Set-Cookie` header values
///
/// Every header is scanned in order; the first match is percent-decoded and
/// returned.
pub fn find_token<'a>(set_cookie_headers: impl IntoIterator<Item = &'a str>) -> Option<String> {
    set_cookie_headers
        .into_iter()
        .filter(|header| header.contains(XSRF_COOKIE))
        .find_map(|header| token_pattern().captures(header))
        .map(|captures| {
            let raw = captures[1].as_bytes();
            String::from_utf8_lossy(&urlencoding::decode_binary(raw)).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_token_in_later_header() {
        let headers = [
            "laravel_session=abc; path=/; httponly",
            "XSRF-TOKEN=eyJpdiI6%3D%3D; expires=Mon, 01 Jan 2024 00:00:00 GMT; path=/",
        ];
        assert_eq!(find_token(headers), Some("eyJpdiI6==".to_string()));
    }

    #[test]
    fn test_token_at_end_of_header() {
        assert_eq!(find_token(["XSRF-TOKEN=plain"]), Some("plain".to_string()));
    }

    #[test]
    fn test_plus_is_not_a_space() {
        assert_eq!(find_token(["XSRF-TOKEN=a+b%2Fc"]), Some("a+b/c".to_string()));
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(find_token(["session=1", "other=2"]), None);
        assert_eq!(find_token(std::iter::empty::<&str>()), None);
    }

    #[test]
    fn test_empty_token_value_is_not_a_match() {
        assert_eq!(find_token(["XSRF-TOKEN=; path=/"]), None);
    }
}
