// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Reconnaissance Spider
 * Discovers attack surface: URLs, forms, loose inputs, AJAX parameters
 *
 * Drives a single browser session through the target, deduplicating
 * everything it finds into a ReconReport. One directory-enumeration
 * pass runs after the first queue drain; a request tap mines SQLi
 * candidates out of AJAX traffic the DOM never shows.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{js_string, BrowserSession};
use crate::config::ScanConfig;
use crate::cookie_manager::CookieManager;
use crate::directory_enum;
use crate::errors::ScannerError;
use crate::form_collector::FormCollector;
use crate::link_collector::LinkCollector;
use crate::report::ReconReport;
use crate::state::CrawlRuntimeState;
use crate::targeting::TargetFilter;

/// Settle time after navigation before extraction.
const PAGE_SETTLE: Duration = Duration::from_millis(500);

/// Settle time after an auto-click, long enough for a client-side
/// route change to render.
const CLICK_SETTLE: Duration = Duration::from_millis(700);

const ROUTER_CANDIDATES_JS: &str = r#"
    (function() {
        const keys = [];
        document.querySelectorAll("a[href^='#']").forEach(a => {
            const href = a.getAttribute('href');
            if (href && href.startsWith('#/')) keys.push('hash::' + href);
        });
        document.querySelectorAll('[routerlink]').forEach(el => {
            const value = el.getAttribute('routerlink');
            if (value) keys.push('router::' + value);
        });
        document.querySelectorAll('button[onclick]').forEach(b => {
            const handler = b.getAttribute('onclick') || '';
            if (handler.includes('location')) keys.push('click::' + handler);
        });
        return JSON.stringify(Array.from(new Set(keys)));
    })()
"#;

/// Collects URLs, forms and cookies from the target application.
pub struct Spider {
    config: ScanConfig,
    filter: Arc<TargetFilter>,
    link_collector: LinkCollector,
    form_collector: FormCollector,
    cookie_manager: CookieManager,
}

impl Spider {
    pub fn new(config: ScanConfig) -> Result<Self, ScannerError> {
        let filter = TargetFilter::for_target(&config.target_url).ok_or_else(|| {
            ScannerError::Configuration(format!(
                "Target URL '{}' has no usable host",
                config.target_url
            ))
        })?;
        let filter = Arc::new(filter);

        Ok(Self {
            link_collector: LinkCollector::new(Arc::clone(&filter)),
            form_collector: FormCollector::new(Arc::clone(&filter)),
            cookie_manager: CookieManager::new(config.clone(), Arc::clone(&filter)),
            filter,
            config,
        })
    }

    pub fn target_filter(&self) -> Arc<TargetFilter> {
        Arc::clone(&self.filter)
    }

    /// Crawl the target and return the populated report. Single-page
    /// failures abandon that URL and keep going; only the state needed
    /// for this run lives here, reset on entry.
    pub fn run(&self, session: &BrowserSession) -> ReconReport {
        let mut report = ReconReport::new(self.config.target_url.clone());
        let mut state = CrawlRuntimeState::new();

        // AJAX tap: every same-origin GET carrying a query string
        // becomes a FUZZ-substituted SQLi candidate.
        let ajax_sink: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        self.install_ajax_tap(session, &ajax_sink);

        self.cookie_manager
            .bootstrap(session, &mut report, &mut state);

        let seed = self.config.target_url.clone();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(seed.clone());
        state.seen_urls.insert(seed.clone());
        report.discovered_urls.insert(seed.clone());
        self.link_collector.record_url(&seed, &mut report);

        let mut enumeration_ran = false;

        loop {
            while let Some(url) = queue.pop_front() {
                if !state.visited_urls.insert(url.clone()) {
                    continue;
                }

                debug!("[Spider] Visiting {}", url);
                if let Err(e) = session.navigate(&url) {
                    warn!("[Spider] Abandoning {}: {}", url, e);
                    continue;
                }
                session.settle(PAGE_SETTLE);

                self.link_collector.record_url(&url, &mut report);
                self.collect_page(session, &url, &mut report, &mut state, &mut queue);
                self.cookie_manager
                    .refresh_from_page(session, &mut report, &mut state);
                self.auto_click_pass(session, &mut report, &mut state, &mut queue);

                self.drain_ajax_sink(&ajax_sink, &mut report);
            }

            if enumeration_ran {
                break;
            }
            let cookies = report.cookies.clone();
            self.run_enumeration(&cookies, &mut report, &mut state, &mut queue);
            enumeration_ran = true;
        }

        self.drain_ajax_sink(&ajax_sink, &mut report);

        info!(
            "[Spider] Crawl complete: {} URLs, {} XSS forms, {} SQLi targets, {} access targets",
            report.discovered_urls.len(),
            report.xss_forms.len(),
            report.sqli_targets.len(),
            report.access_targets.len()
        );

        report
    }

    fn collect_page(
        &self,
        session: &BrowserSession,
        url: &str,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
        queue: &mut VecDeque<String>,
    ) {
        self.form_collector
            .collect_from_page(session, url, report, state);

        let new_links = self
            .link_collector
            .collect_from_page(session, url, report, state);

        if new_links.is_empty() {
            // DOM query path came up empty; fall back to the raw HTML.
            if let Ok(html) = session.content() {
                let fallback =
                    self.link_collector
                        .gather_from_html(&html, url, report, state);
                queue.extend(fallback);
            }
        } else {
            queue.extend(new_links);
        }
    }

    /// Click SPA navigation candidates that full navigation never
    /// reaches, re-collecting after each click. The clicked set makes
    /// each candidate fire at most once per crawl, which also bounds
    /// the loop.
    fn auto_click_pass(
        &self,
        session: &BrowserSession,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
        queue: &mut VecDeque<String>,
    ) {
        loop {
            let candidates: Vec<String> = match session.eval_json(ROUTER_CANDIDATES_JS) {
                Ok(value) => serde_json::from_value(value).unwrap_or_default(),
                Err(_) => break,
            };

            let next = candidates
                .into_iter()
                .find(|key| !state.clicked_router_links.contains(key));
            let key = match next {
                Some(key) => key,
                None => break,
            };
            state.clicked_router_links.insert(key.clone());

            let (kind, value) = match key.split_once("::") {
                Some(parts) => parts,
                None => continue,
            };

            if !self.click_candidate(session, kind, value) {
                continue;
            }
            session.settle(CLICK_SETTLE);

            let current = session.current_url();
            debug!("[Spider] Auto-clicked {} -> {}", key, current);
            self.collect_page(session, &current, report, state, queue);
        }
    }

    fn click_candidate(&self, session: &BrowserSession, kind: &str, value: &str) -> bool {
        let script = format!(
            r#"
            (function() {{
                const kind = {kind};
                const value = {value};
                let el = null;
                if (kind === 'hash') {{
                    el = Array.from(document.querySelectorAll('a[href]'))
                        .find(a => a.getAttribute('href') === value);
                }} else if (kind === 'router') {{
                    el = Array.from(document.querySelectorAll('[routerlink]'))
                        .find(e => e.getAttribute('routerlink') === value);
                }} else {{
                    el = Array.from(document.querySelectorAll('button[onclick]'))
                        .find(b => (b.getAttribute('onclick') || '') === value);
                }}
                if (!el) return false;
                el.click();
                return true;
            }})()
            "#,
            kind = js_string(kind),
            value = js_string(value),
        );
        session.eval_bool(&script)
    }

    /// One enumeration pass per run. Failure degrades to no results.
    fn run_enumeration(
        &self,
        cookies: &[crate::types::CookieRecord],
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
        queue: &mut VecDeque<String>,
    ) {
        info!("[Enum] Starting directory enumeration pass");
        let discovered = match directory_enum::enumerate(
            &self.config.target_url,
            cookies,
            self.config.wordlist.as_deref(),
        ) {
            Ok(discovered) => discovered,
            Err(e) => {
                warn!("[Enum] Enumeration unavailable: {}", e);
                return;
            }
        };

        for url in discovered {
            if !self.filter.is_allowed(&url) {
                continue;
            }
            report.access_targets.insert(url.clone());
            state.enum_urls.insert(url.clone());

            if state.seen_urls.insert(url.clone()) {
                report.discovered_urls.insert(url.clone());
                queue.push_back(url);
            }
        }
    }

    fn install_ajax_tap(&self, session: &BrowserSession, sink: &Arc<Mutex<HashSet<String>>>) {
        let filter = Arc::clone(&self.filter);
        let sink = Arc::clone(sink);

        let result = session.install_request_tap(move |method, url| {
            if !method.eq_ignore_ascii_case("GET") {
                return;
            }
            if !filter.is_allowed(url) {
                return;
            }
            if let Some(fuzzed) = fuzz_query_url(url) {
                sink.lock().insert(fuzzed);
            }
        });

        if let Err(e) = result {
            // Crawl still works without the tap; AJAX-only parameters
            // are simply not mined.
            warn!("[Spider] Request tap unavailable: {}", e);
        }
    }

    fn drain_ajax_sink(&self, sink: &Arc<Mutex<HashSet<String>>>, report: &mut ReconReport) {
        let drained: Vec<String> = sink.lock().drain().collect();
        for url in drained {
            report.sqli_targets.insert(url);
        }
    }
}

/// Replace every query parameter value with the FUZZ placeholder.
/// Returns `None` for URLs without query parameters.
pub fn fuzz_query_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let names: Vec<String> = parsed
        .query_pairs()
        .map(|(name, _)| name.into_owned())
        .collect();
    if names.is_empty() {
        return None;
    }

    let query = names
        .iter()
        .map(|name| format!("{}=FUZZ", name))
        .collect::<Vec<_>>()
        .join("&");
    parsed.set_query(Some(&query));
    Some(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_fuzz_query_url() {
        assert_eq!(
            fuzz_query_url("http://t/api/search?q=apple&limit=10").as_deref(),
            Some("http://t/api/search?q=FUZZ&limit=FUZZ")
        );
        assert_eq!(
            fuzz_query_url("http://t/api/search?q=").as_deref(),
            Some("http://t/api/search?q=FUZZ")
        );
        assert!(fuzz_query_url("http://t/api/items").is_none());
        assert!(fuzz_query_url("not a url").is_none());
    }

    #[test]
    fn test_spider_rejects_hostless_target() {
        let config = ScanConfig {
            target_url: "http://".to_string(),
            report_path: PathBuf::from("out.json"),
            session_cookie: None,
            auth_email: None,
            auth_password: None,
            login_url: None,
            login_email_selector: "input[name='email']".to_string(),
            login_password_selector: "input[name='password']".to_string(),
            headless: true,
            navigation_timeout_secs: 8,
            callback_port: 8000,
            listener_url: None,
            wordlist: None,
        };
        assert!(Spider::new(config).is_err());
    }
}
