// src/utils.rs
use reqwest::Url;

use crate::types::SkipReason;

/// Collapse runs of whitespace (including newlines) into single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a scraped href against the page it came from.
///
/// Only http(s) results are accepted, so `javascript:` and `mailto:` links are skipped.
pub fn resolve_link(page_url: &Url, href: &str) -> Result<String, SkipReason> {
    let href = href.trim();
    if href.is_empty() {
        return Err(SkipReason::MissingLink);
    }

    let resolved = page_url
        .join(href)
        .map_err(|_| SkipReason::InvalidLink(href.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => Ok(resolved.to_string()),
        _ => Err(SkipReason::InvalidLink(href.to_string())),
    }
}

/// Trim a configured base URL so paths can be appended
pub fn normalize_base_url(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Senior\n   DevOps  Engineer \t"), "Senior DevOps Engineer");
        assert_eq!(clean_text("\n\n"), "");
    }

    #[test]
    fn test_resolve_link() {
        let page = Url::parse("https://in.indeed.com/jobs?q=devops&l=Bangalore").unwrap();

        assert_eq!(
            resolve_link(&page, "/rc/clk?jk=abc123").unwrap(),
            "https://in.indeed.com/rc/clk?jk=abc123"
        );
        assert_eq!(
            resolve_link(&page, "https://www.linkedin.com/jobs/view/42").unwrap(),
            "https://www.linkedin.com/jobs/view/42"
        );
        assert_eq!(resolve_link(&page, "   "), Err(SkipReason::MissingLink));
        assert_eq!(
            resolve_link(&page, "javascript:void(0)"),
            Err(SkipReason::InvalidLink("javascript:void(0)".to_string()))
        );
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://www.naukri.com/ "), "https://www.naukri.com");
        assert_eq!(normalize_base_url("http://127.0.0.1:4000"), "http://127.0.0.1:4000");
    }
}
