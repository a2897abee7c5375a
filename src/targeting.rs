// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Authorization-scope filtering for crawl targets.
//!
//! Everything the spider records must pass through this filter: URLs
//! outside the configured host (or on an excluded third-party host) are
//! rejected, and cookies are kept only when scoped to the target.

use std::collections::HashSet;
use url::Url;

use crate::types::CookieRecord;

/// Host keywords that mark accidental third-party links (VCS hosting,
/// analytics) even when a page on the target references them.
pub const DEFAULT_EXCLUDED_HOST_KEYWORDS: &[&str] = &["github"];

/// Host allow-listing and cookie-domain filtering rules.
///
/// Pure logic, no side effects; the only failure mode is "reject".
#[derive(Debug, Clone)]
pub struct TargetFilter {
    target_host: String,
    target_hostname: String,
    excluded_keywords: HashSet<String>,
}

impl TargetFilter {
    /// Build a filter for the given target URL. `target_host` keeps the
    /// port (when present), `target_hostname` does not.
    pub fn for_target(target_url: &str) -> Option<Self> {
        let parsed = Url::parse(target_url).ok()?;
        let hostname = parsed.host_str()?.to_lowercase();
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", hostname, port),
            None => hostname.clone(),
        };

        Some(Self {
            target_host: host,
            target_hostname: hostname,
            excluded_keywords: DEFAULT_EXCLUDED_HOST_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        })
    }

    pub fn with_excluded_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_keywords = keywords.into_iter().map(|k| k.into().to_lowercase()).collect();
        self
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    pub fn target_hostname(&self) -> &str {
        &self.target_hostname
    }

    /// Whether a URL belongs to the authorized target.
    pub fn is_allowed(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }

        let hostname = match parsed.host_str() {
            Some(host) => host.to_lowercase(),
            None => return false,
        };
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", hostname, port),
            None => hostname.clone(),
        };

        if host != self.target_host && hostname != self.target_hostname {
            return false;
        }

        !self.has_excluded_keyword(&hostname)
    }

    pub fn has_excluded_keyword(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        let normalized = value.to_lowercase();
        self.excluded_keywords
            .iter()
            .any(|keyword| normalized.contains(keyword))
    }

    /// Keep only cookies whose domain equals the target hostname or is
    /// a subdomain of it. Cookies without a domain are dropped.
    pub fn filter_cookies(&self, cookies: &[CookieRecord]) -> Vec<CookieRecord> {
        let suffix = format!(".{}", self.target_hostname);

        cookies
            .iter()
            .filter(|cookie| {
                let domain = cookie
                    .domain
                    .as_deref()
                    .unwrap_or("")
                    .trim_start_matches('.')
                    .to_lowercase();
                if domain.is_empty() {
                    return false;
                }
                domain == self.target_host
                    || domain == self.target_hostname
                    || domain.ends_with(&suffix)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> TargetFilter {
        TargetFilter::for_target("http://target.example:3000/").unwrap()
    }

    #[test]
    fn test_same_host_allowed() {
        let f = filter();
        assert!(f.is_allowed("http://target.example:3000/products?id=1"));
        assert!(f.is_allowed("https://target.example/login"));
    }

    #[test]
    fn test_foreign_host_rejected() {
        let f = filter();
        assert!(!f.is_allowed("http://evil.example/"));
        assert!(!f.is_allowed("http://sub.target.example/"));
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        let f = filter();
        assert!(!f.is_allowed("javascript:alert(1)"));
        assert!(!f.is_allowed("mailto:admin@target.example"));
        assert!(!f.is_allowed("ftp://target.example/file"));
    }

    #[test]
    fn test_excluded_keyword_rejected() {
        let f = TargetFilter::for_target("https://github.com/acme/app").unwrap();
        // Even the target itself is rejected when it matches an excluded keyword
        assert!(!f.is_allowed("https://github.com/acme/app/issues"));
    }

    #[test]
    fn test_garbage_rejected() {
        let f = filter();
        assert!(!f.is_allowed("not a url"));
        assert!(!f.is_allowed(""));
    }

    #[test]
    fn test_cookie_domain_filtering() {
        let f = filter();
        let cookies = vec![
            CookieRecord::new("token", "a").with_domain("target.example"),
            CookieRecord::new("wide", "b").with_domain(".target.example"),
            CookieRecord::new("sub", "c").with_domain("api.target.example"),
            CookieRecord::new("tracker", "d").with_domain("ads.example"),
            CookieRecord::new("orphan", "e"),
        ];

        let kept = f.filter_cookies(&cookies);
        let names: Vec<&str> = kept.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["token", "wide", "sub"]);
    }
}
