use alloc::vec::Vec;

/// Whether the text is an absolute `http` or `https` URL. Placeholder values
/// left behind by spreadsheet imports (`nan`, `None`) are rejected.
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    if matches!(url, "" | "nan" | "None") {
        return false;
    }
    url.starts_with("http://") || url.starts_with("https://")
}

/// Splits a comma-separated list of image URLs, keeping only the valid ones.
pub fn parse_image_urls(list: &str) -> Vec<&str> {
    list.split(',').map(str::trim).filter(|url| is_valid_url(url)).collect()
}

/// Normalizes an optional URL field. Blank or invalid input becomes `None`.
pub fn normalize_url(url: Option<&str>) -> Option<&str> {
    url.map(str::trim).filter(|url| is_valid_url(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(is_valid_url("https://i.ibb.co/abc/scan.png"));
        assert!(is_valid_url("  http://example.com  "));
    }

    #[test]
    fn rejects_placeholders_and_relative_paths() {
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("nan"));
        assert!(!is_valid_url("None"));
        assert!(!is_valid_url("image/scan.png"));
        assert!(!is_valid_url("ftp://example.com/file"));
    }

    #[test]
    fn parses_comma_separated_lists() {
        let urls = parse_image_urls("https://a.com/1.png, nan,https://b.com/2.png ,, image/3.png");
        assert_eq!(urls, ["https://a.com/1.png", "https://b.com/2.png"]);
        assert!(parse_image_urls("").is_empty());
    }

    #[test]
    fn normalizes_optional_urls() {
        assert_eq!(normalize_url(Some(" https://youtu.be/x ")), Some("https://youtu.be/x"));
        assert_eq!(normalize_url(Some("   ")), None);
        assert_eq!(normalize_url(None), None);
    }
}
