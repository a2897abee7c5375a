// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Link extraction and normalization.
//!
//! Collects anchor and router-link targets from rendered pages (with a
//! static-HTML fallback), resolves them against the current URL and
//! surfaces query-carrying URLs as SQLi candidates. SPA hash routes
//! (`#/path`) are kept as real routes; plain fragments are stripped.

use std::sync::Arc;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::browser::BrowserSession;
use crate::report::ReconReport;
use crate::state::CrawlRuntimeState;
use crate::targeting::TargetFilter;

const LINKS_JS: &str = r#"
    (function() {
        const hrefs = [];
        document.querySelectorAll('a').forEach(a => {
            const href = a.getAttribute('href') || a.getAttribute('routerlink');
            if (href) hrefs.push(href);
        });
        document.querySelectorAll('[routerlink]').forEach(el => {
            const href = el.getAttribute('routerlink');
            if (href) hrefs.push(href);
        });
        return JSON.stringify(hrefs);
    })()
"#;

pub struct LinkCollector {
    filter: Arc<TargetFilter>,
}

impl LinkCollector {
    pub fn new(filter: Arc<TargetFilter>) -> Self {
        Self { filter }
    }

    /// Record a URL as an SQLi candidate when it carries query
    /// parameters and belongs to the target.
    pub fn record_url(&self, url: &str, report: &mut ReconReport) {
        if url.contains('?') && url.contains('=') && self.filter.is_allowed(url) {
            report.sqli_targets.insert(url.to_string());
        }
    }

    /// Resolve an href against the current URL and scope-check it.
    ///
    /// Fragments starting with `/` are SPA routes and survive
    /// normalization; any other fragment is dropped.
    pub fn normalize(&self, base_url: &str, href: &str) -> Option<String> {
        if href.is_empty() {
            return None;
        }

        let base = Url::parse(base_url).ok()?;
        let mut joined = base.join(href).ok()?;

        if !self.filter.is_allowed(joined.as_str()) {
            return None;
        }

        let keep_fragment = joined
            .fragment()
            .map(|f| f.starts_with('/'))
            .unwrap_or(false);
        if !keep_fragment {
            joined.set_fragment(None);
        }

        Some(joined.to_string())
    }

    /// Collect same-origin links from the rendered page. Returns only
    /// URLs not yet seen this run; the spider enqueues them.
    pub fn collect_from_page(
        &self,
        session: &BrowserSession,
        current_url: &str,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) -> Vec<String> {
        let hrefs = match session.eval_json(LINKS_JS) {
            Ok(value) => value,
            Err(e) => {
                debug!("[Spider] Link extraction failed on {}: {}", current_url, e);
                return Vec::new();
            }
        };

        let hrefs: Vec<String> = serde_json::from_value(hrefs).unwrap_or_default();
        self.register(hrefs.iter().map(String::as_str), current_url, report, state)
    }

    /// Static-HTML fallback for pages whose DOM could not be queried.
    pub fn gather_from_html(
        &self,
        html: &str,
        current_url: &str,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) -> Vec<String> {
        let document = Html::parse_document(html);
        let anchor_selector = Selector::parse("a").unwrap();
        let router_selector = Selector::parse("[routerlink]").unwrap();

        let mut hrefs: Vec<String> = Vec::new();
        for element in document.select(&anchor_selector) {
            let href = element
                .value()
                .attr("href")
                .or_else(|| element.value().attr("routerlink"));
            if let Some(href) = href {
                hrefs.push(href.to_string());
            }
        }
        for element in document.select(&router_selector) {
            if let Some(href) = element.value().attr("routerlink") {
                hrefs.push(href.to_string());
            }
        }

        self.register(hrefs.iter().map(String::as_str), current_url, report, state)
    }

    fn register<'a>(
        &self,
        hrefs: impl Iterator<Item = &'a str>,
        current_url: &str,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) -> Vec<String> {
        let mut new_links = Vec::new();

        for href in hrefs {
            let normalized = match self.normalize(current_url, href) {
                Some(url) => url,
                None => continue,
            };

            self.record_url(&normalized, report);

            if state.seen_urls.insert(normalized.clone()) {
                report.discovered_urls.insert(normalized.clone());
                new_links.push(normalized);
            }
        }

        new_links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> LinkCollector {
        let filter = Arc::new(TargetFilter::for_target("http://target.example/").unwrap());
        LinkCollector::new(filter)
    }

    #[test]
    fn test_spa_route_fragment_preserved() {
        let c = collector();
        let normalized = c.normalize("http://target.example/", "#/search").unwrap();
        assert_eq!(normalized, "http://target.example/#/search");
    }

    #[test]
    fn test_plain_fragment_stripped() {
        let c = collector();
        let normalized = c.normalize("http://target.example/about", "#top").unwrap();
        assert_eq!(normalized, "http://target.example/about");
    }

    #[test]
    fn test_relative_href_resolved() {
        let c = collector();
        let normalized = c.normalize("http://target.example/a/b", "../c").unwrap();
        assert_eq!(normalized, "http://target.example/c");
    }

    #[test]
    fn test_foreign_host_dropped() {
        let c = collector();
        assert!(c.normalize("http://target.example/", "http://evil.example/x").is_none());
        assert!(c.normalize("http://target.example/", "javascript:void(0)").is_none());
    }

    #[test]
    fn test_html_fallback_collects_and_records_sqli() {
        let c = collector();
        let mut report = ReconReport::new("http://target.example/");
        let mut state = CrawlRuntimeState::new();

        let html = r##"
            <html><body>
                <a href="/items?id=3">item</a>
                <a href="#/profile">profile</a>
                <div routerlink="/admin">admin</div>
                <a href="http://evil.example/">out</a>
            </body></html>
        "##;

        let links = c.gather_from_html(html, "http://target.example/", &mut report, &mut state);

        assert_eq!(
            links,
            vec![
                "http://target.example/items?id=3",
                "http://target.example/#/profile",
                "http://target.example/admin",
            ]
        );
        assert!(report
            .sqli_targets
            .contains("http://target.example/items?id=3"));
        assert!(report
            .discovered_urls
            .contains("http://target.example/#/profile"));
    }

    #[test]
    fn test_seen_urls_not_returned_twice() {
        let c = collector();
        let mut report = ReconReport::new("http://target.example/");
        let mut state = CrawlRuntimeState::new();
        let html = r#"<a href="/once">x</a>"#;

        let first = c.gather_from_html(html, "http://target.example/", &mut report, &mut state);
        let second = c.gather_from_html(html, "http://target.example/", &mut report, &mut state);

        assert_eq!(first, vec!["http://target.example/once"]);
        assert!(second.is_empty());
    }
}
