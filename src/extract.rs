use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Outcome of running the extractor over one rendered profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    /// The page is a throttling interstitial; no counts are available and the
    /// caller should cool down before retrying.
    RateLimited,
    /// Counts found on the page. Either field may be absent when the page had
    /// no recognizable token for it; absence is a normal outcome.
    Counts {
        followers: Option<u64>,
        following: Option<u64>,
    },
}

static OG_DESCRIPTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:description"]"#).expect("og:description selector is valid")
});

static OG_COUNTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([\d,.kKmM]+)\s+Followers,\s+([\d,.kKmM]+)\s+Following")
        .expect("og counts regex is valid")
});

static FOLLOWERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d,.km]+)\s*followers").expect("followers regex is valid"));

static FOLLOWING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d,.km]+)\s*following").expect("following regex is valid"));

static HUMAN_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9.]+)\s*([km])?$").expect("human count regex is valid"));

/// Extract follower/following counts from a rendered profile page.
///
/// Rate-limit detection runs first and wins over everything else: throttling
/// interstitials can contain digit-like tokens that would otherwise be
/// misparsed as counts. After that the `og:description` meta tag is preferred,
/// falling back to two independent searches over the visible page text. The
/// fallback searches may pick numbers from unrelated parts of the page; that
/// risk is accepted.
pub fn extract(html: &str) -> ExtractionResult {
    let document = Html::parse_document(html);
    let full_text = visible_text(&document);

    if full_text.contains("please wait a few minutes") || full_text.contains("try again later") {
        return ExtractionResult::RateLimited;
    }

    if let Some(content) = og_description(&document) {
        if let Some(caps) = OG_COUNTS_RE.captures(&content) {
            return ExtractionResult::Counts {
                followers: parse_human_count(&caps[1]),
                following: parse_human_count(&caps[2]),
            };
        }
    }

    let followers = FOLLOWERS_RE
        .captures(&full_text)
        .and_then(|caps| parse_human_count(&caps[1]));
    let following = FOLLOWING_RE
        .captures(&full_text)
        .and_then(|caps| parse_human_count(&caps[1]));

    ExtractionResult::Counts {
        followers,
        following,
    }
}

/// Parse a human-readable count token such as `"1,234"`, `"3.2k"` or `"1M"`.
///
/// Thousands separators are removed, `k`/`m` suffixes scale by 1 000 and
/// 1 000 000, and fractional values are truncated, not rounded. Tokens that
/// do not fit the pattern degrade to whatever digits they contain; a token
/// with no digits parses to `None`.
pub fn parse_human_count(raw: &str) -> Option<u64> {
    let token = raw.trim().to_lowercase().replace(',', "");

    if let Some(caps) = HUMAN_COUNT_RE.captures(&token) {
        if let Ok(value) = caps[1].parse::<f64>() {
            let factor = match caps.get(2).map(|m| m.as_str()) {
                Some("k") => 1_000.0,
                Some("m") => 1_000_000.0,
                _ => 1.0,
            };
            return Some((value * factor) as u64);
        }
    }

    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// All visible text of the document with whitespace collapsed, lowercased.
fn visible_text(document: &Html) -> String {
    let raw: Vec<&str> = document.root_element().text().collect();
    raw.join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn og_description(document: &Html) -> Option<String> {
    document
        .select(&OG_DESCRIPTION_SELECTOR)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_number_with_separators() {
        assert_eq!(parse_human_count("1,234"), Some(1234));
        assert_eq!(parse_human_count("42"), Some(42));
        assert_eq!(parse_human_count(" 7 "), Some(7));
    }

    #[test]
    fn test_parse_suffixed_numbers() {
        assert_eq!(parse_human_count("3.2k"), Some(3200));
        assert_eq!(parse_human_count("3.2K"), Some(3200));
        assert_eq!(parse_human_count("1M"), Some(1_000_000));
        assert_eq!(parse_human_count("1.5m"), Some(1_500_000));
        assert_eq!(parse_human_count("10 k"), Some(10_000));
    }

    #[test]
    fn test_parse_truncates_instead_of_rounding() {
        assert_eq!(parse_human_count("12.9"), Some(12));
        assert_eq!(parse_human_count("1.999k"), Some(1999));
        assert_eq!(parse_human_count("0.0019m"), Some(1900));
    }

    #[test]
    fn test_parse_fallback_strips_non_digits() {
        assert_eq!(parse_human_count("1 234 followers"), Some(1234));
        assert_eq!(parse_human_count("#99!"), Some(99));
    }

    #[test]
    fn test_parse_absence_is_none() {
        assert_eq!(parse_human_count(""), None);
        assert_eq!(parse_human_count("abc"), None);
        assert_eq!(parse_human_count("..."), None);
    }

    #[test]
    fn test_rate_limit_wins_over_numeric_content() {
        let html = r#"<html><head>
            <meta property="og:description" content="1,234 Followers, 56 Following" />
            </head><body><p>Please Wait A Few Minutes before you try again.</p></body></html>"#;
        assert_eq!(extract(html), ExtractionResult::RateLimited);

        let html = "<html><body>Something went wrong. Try again later.</body></html>";
        assert_eq!(extract(html), ExtractionResult::RateLimited);
    }

    #[test]
    fn test_og_description_is_preferred() {
        let html = r#"<html><head>
            <meta property="og:description" content="1,234 Followers, 56 Following, 10 Posts" />
            </head><body><p>999 followers shown elsewhere</p></body></html>"#;
        assert_eq!(
            extract(html),
            ExtractionResult::Counts {
                followers: Some(1234),
                following: Some(56),
            }
        );
    }

    #[test]
    fn test_og_description_with_suffixed_counts() {
        let html = r#"<html><head>
            <meta property="og:description" content="10.5K Followers, 1.2k Following" />
            </head><body></body></html>"#;
        assert_eq!(
            extract(html),
            ExtractionResult::Counts {
                followers: Some(10_500),
                following: Some(1200),
            }
        );
    }

    #[test]
    fn test_body_text_fallback_is_independent() {
        let html = "<html><body><span>500 following</span></body></html>";
        assert_eq!(
            extract(html),
            ExtractionResult::Counts {
                followers: None,
                following: Some(500),
            }
        );

        let html = "<html><body><div>2.5k followers</div><footer>88 following</footer></body></html>";
        assert_eq!(
            extract(html),
            ExtractionResult::Counts {
                followers: Some(2500),
                following: Some(88),
            }
        );
    }

    #[test]
    fn test_unparseable_og_falls_back_to_body_text() {
        let html = r#"<html><head>
            <meta property="og:description" content="a profile with no counts" />
            </head><body>12 followers</body></html>"#;
        assert_eq!(
            extract(html),
            ExtractionResult::Counts {
                followers: Some(12),
                following: None,
            }
        );
    }

    #[test]
    fn test_nothing_found_is_empty_counts() {
        let html = "<html><body><h1>Page not found</h1></body></html>";
        assert_eq!(
            extract(html),
            ExtractionResult::Counts {
                followers: None,
                following: None,
            }
        );
    }

    #[test]
    fn test_tags_are_stripped_and_whitespace_collapsed() {
        let html = "<html><body><b>1,000</b>\n\t <i>followers</i></body></html>";
        assert_eq!(
            extract(html),
            ExtractionResult::Counts {
                followers: Some(1000),
                following: None,
            }
        );
    }
}
