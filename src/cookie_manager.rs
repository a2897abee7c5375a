// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session bootstrap and cookie synchronization.
//!
//! Establishes an authenticated browser session before the crawl and
//! keeps the report's cookie list current as navigation proceeds.
//! Bootstrap strategies run in strict precedence order; each failure is
//! swallowed and the next strategy is tried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::config::{ScanConfig, DEMO_EMAIL, DEMO_PASSWORD};
use crate::report::ReconReport;
use crate::state::CrawlRuntimeState;
use crate::targeting::TargetFilter;
use crate::types::CookieRecord;

const SELECTOR_WAIT: Duration = Duration::from_secs(10);
const LOGIN_REDIRECT_WAIT: Duration = Duration::from_secs(7);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct CookieManager {
    config: ScanConfig,
    filter: Arc<TargetFilter>,
}

impl CookieManager {
    pub fn new(config: ScanConfig, filter: Arc<TargetFilter>) -> Self {
        Self { config, filter }
    }

    /// Prime the browser context with authentication cookies.
    ///
    /// Precedence: explicit session cookie, configured credentials,
    /// demo login, then whatever cookies the incoming report already
    /// carries (cold start: none). First success wins.
    pub fn bootstrap(
        &self,
        session: &BrowserSession,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) {
        if let Some(cookies) = self.apply_session_cookie(session) {
            info!("[Session] Bootstrapped from explicit session cookie");
            self.store(cookies, report, state);
            return;
        }

        if self.config.has_credentials() {
            let email = self.config.auth_email.clone().unwrap_or_default();
            let password = self.config.auth_password.clone().unwrap_or_default();
            if let Some(cookies) = self.login(session, &self.config.login_url(), &email, &password)
            {
                info!("[Session] Bootstrapped via credential login");
                self.store(cookies, report, state);
                return;
            }
            warn!("[Session] Credential login failed, falling through");
        }

        if let Some(cookies) =
            self.login(session, &self.config.login_url(), DEMO_EMAIL, DEMO_PASSWORD)
        {
            info!("[Session] Bootstrapped via demo login");
            self.store(cookies, report, state);
            return;
        }

        // Last resort: reuse cookies from a previous run's report.
        let fallback = self.filter.filter_cookies(&report.cookies);
        if fallback.is_empty() {
            warn!("[Session] No session established, proceeding unauthenticated");
        } else {
            info!("[Session] Reusing {} cookie(s) from prior report", fallback.len());
        }
        self.store(fallback, report, state);
    }

    /// Re-read cookies after a navigation and overwrite the report's
    /// list (last observed wins, so rotated tokens propagate forward).
    /// Failure to read is non-fatal and skips the refresh.
    pub fn refresh_from_page(
        &self,
        session: &BrowserSession,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) {
        let cookies = match session.cookies() {
            Ok(cookies) => cookies,
            Err(e) => {
                debug!("[Session] Cookie refresh skipped: {}", e);
                return;
            }
        };

        let filtered = self.filter.filter_cookies(&cookies);
        if !filtered.is_empty() {
            self.store(filtered, report, state);
        }
    }

    // ------------------------------------------------------------------
    // Bootstrap strategies
    // ------------------------------------------------------------------

    fn apply_session_cookie(&self, session: &BrowserSession) -> Option<Vec<CookieRecord>> {
        let raw = self.config.session_cookie.as_deref()?;
        let (name, value) = raw.split_once('=')?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return None;
        }

        session.navigate(&self.config.target_url).ok()?;
        session.set_cookie(name, value).ok()?;
        // Reload so the cookie rides the request and any server-side
        // session material comes back.
        session.navigate(&self.config.target_url).ok()?;

        let cookies = session.cookies().ok()?;
        let filtered = self.filter.filter_cookies(&cookies);
        if filtered.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }

    /// Drive the login form and wait for the post-login redirect.
    fn login(
        &self,
        session: &BrowserSession,
        login_url: &str,
        email: &str,
        password: &str,
    ) -> Option<Vec<CookieRecord>> {
        session.navigate(login_url).ok()?;
        session.dismiss_overlays();

        let email_selector = self.config.login_email_selector.as_str();
        let password_selector = self.config.login_password_selector.as_str();

        if !wait_until(SELECTOR_WAIT, || session.selector_matches(email_selector)) {
            debug!("[Session] Login form never appeared at {}", login_url);
            return None;
        }

        session.type_into(email_selector, email).ok()?;
        session.type_into(password_selector, password).ok()?;
        session.press_enter().ok()?;

        let left_login = wait_until(LOGIN_REDIRECT_WAIT, || {
            let current = session.current_url();
            current != login_url && !current.contains("login")
        });
        if !left_login {
            debug!("[Session] Still on login page after submit");
            return None;
        }

        let cookies = session.cookies().ok()?;
        let filtered = self.filter.filter_cookies(&cookies);
        if filtered.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }

    fn store(
        &self,
        cookies: Vec<CookieRecord>,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) {
        state.initial_cookies = cookies.clone();
        report.cookies = cookies;
    }
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    loop {
        if condition() {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_until_immediate_success() {
        assert!(wait_until(Duration::from_millis(10), || true));
    }

    #[test]
    fn test_wait_until_deadline() {
        let start = Instant::now();
        assert!(!wait_until(Duration::from_millis(50), || false));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_until_eventual_success() {
        let mut calls = 0;
        let ok = wait_until(Duration::from_secs(5), || {
            calls += 1;
            calls >= 3
        });
        assert!(ok);
        assert_eq!(calls, 3);
    }
}
