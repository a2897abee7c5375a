// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Headless browser session shared by the crawler and the XSS scanner.
//!
//! Wraps a single Chrome/Chromium tab behind a small API: bounded
//! navigation, JSON-returning script evaluation, cookie access and a
//! request tap for mining AJAX traffic. One session is reused serially
//! by the whole pipeline; every call blocks with an explicit timeout.

use std::sync::Arc;
use std::time::Duration;

use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{RequestPattern, RequestStage};
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, warn};

use crate::errors::SessionError;
use crate::types::CookieRecord;

/// Idle timeout for the underlying browser process. Generous because
/// the sequential pipeline sleeps between interactions.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

pub struct BrowserSession {
    // Held so the browser process outlives the tab.
    _browser: Browser,
    tab: Arc<Tab>,
    navigation_timeout: Duration,
}

impl BrowserSession {
    /// Launch Chrome/Chromium and open the tab reused for the whole
    /// scan. Launch failure is fatal to the run.
    pub fn launch(headless: bool, navigation_timeout: Duration) -> Result<Self, SessionError> {
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
            .build()
            .map_err(|e| SessionError::BrowserLaunch {
                reason: format!("launch options error: {}", e),
            })?;

        let browser = Browser::new(options).map_err(|e| SessionError::BrowserLaunch {
            reason: e.to_string(),
        })?;

        let tab = browser.new_tab().map_err(|e| SessionError::TabCreation {
            reason: e.to_string(),
        })?;
        tab.set_default_timeout(navigation_timeout);

        Ok(Self {
            _browser: browser,
            tab,
            navigation_timeout,
        })
    }

    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    /// Navigate and wait for the load to settle, bounded by the
    /// session's navigation timeout.
    pub fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| {
                let reason = e.to_string();
                if reason.to_lowercase().contains("timed out")
                    || reason.to_lowercase().contains("timeout")
                {
                    SessionError::NavigationTimeout {
                        url: url.to_string(),
                        timeout: self.navigation_timeout,
                    }
                } else {
                    SessionError::Navigation {
                        url: url.to_string(),
                        reason,
                    }
                }
            })?;
        Ok(())
    }

    pub fn current_url(&self) -> String {
        self.tab.get_url()
    }

    /// Full rendered HTML of the current document.
    pub fn content(&self) -> Result<String, SessionError> {
        self.tab.get_content().map_err(|e| SessionError::Evaluation {
            reason: e.to_string(),
        })
    }

    /// Evaluate a script whose final expression is `JSON.stringify(..)`
    /// and parse the result.
    pub fn eval_json(&self, script: &str) -> Result<serde_json::Value, SessionError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| SessionError::Evaluation {
                reason: e.to_string(),
            })?;

        let raw = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| SessionError::Evaluation {
                reason: "script returned no JSON string".to_string(),
            })?;

        serde_json::from_str(raw).map_err(|e| SessionError::Evaluation {
            reason: format!("invalid JSON from page: {}", e),
        })
    }

    /// Evaluate a boolean expression; evaluation failures read as false.
    pub fn eval_bool(&self, script: &str) -> bool {
        match self.tab.evaluate(script, false) {
            Ok(result) => result
                .value
                .as_ref()
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            Err(e) => {
                debug!("[Session] Boolean evaluation failed: {}", e);
                false
            }
        }
    }

    /// Fire-and-forget script execution (overlay dismissal, event
    /// dispatch). Failures are logged and swallowed.
    pub fn eval_discard(&self, script: &str) {
        if let Err(e) = self.tab.evaluate(script, false) {
            debug!("[Session] Script evaluation failed: {}", e);
        }
    }

    /// Cookies visible to the current page, including HttpOnly ones.
    pub fn cookies(&self) -> Result<Vec<CookieRecord>, SessionError> {
        let cookies = self.tab.get_cookies().map_err(|e| SessionError::Cookie {
            reason: e.to_string(),
        })?;

        Ok(cookies
            .into_iter()
            .map(|c| CookieRecord {
                name: c.name,
                value: c.value,
                domain: Some(c.domain),
                path: Some(c.path),
            })
            .collect())
    }

    /// Write a cookie for the current origin. The page must already be
    /// on the target; callers navigate first, set, then reload so the
    /// cookie rides the next request.
    pub fn set_cookie(&self, name: &str, value: &str) -> Result<(), SessionError> {
        let script = format!(
            "document.cookie = {}; true",
            js_string(&format!("{}={}; path=/", name.trim(), value.trim()))
        );
        if self.eval_bool(&script) {
            Ok(())
        } else {
            Err(SessionError::Cookie {
                reason: format!("failed to set cookie '{}'", name),
            })
        }
    }

    /// Whether any element matches the selector right now.
    pub fn selector_matches(&self, selector: &str) -> bool {
        let script = format!(
            "document.querySelector({}) !== null",
            js_string(selector)
        );
        self.eval_bool(&script)
    }

    /// Click the first element matching the selector, via the browser's
    /// trusted click path.
    pub fn click(&self, selector: &str) -> Result<(), SessionError> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|_| SessionError::ElementNotFound {
                field: selector.to_string(),
            })?;
        element.click().map_err(|e| SessionError::Evaluation {
            reason: format!("click on '{}' failed: {}", selector, e),
        })?;
        Ok(())
    }

    /// Focus the field, clear any existing value, type the text, then
    /// dispatch input/change so framework bindings observe it.
    pub fn type_into(&self, selector: &str, text: &str) -> Result<(), SessionError> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|_| SessionError::ElementNotFound {
                field: selector.to_string(),
            })?;

        if element.click().is_err() {
            // Click-to-focus can fail on overlapped elements; focus still works.
            let _ = element.focus();
        }

        self.eval_discard(&format!(
            "(function() {{ const el = document.querySelector({}); if (el) el.value = ''; }})()",
            js_string(selector)
        ));

        element
            .type_into(text)
            .map_err(|e| SessionError::Evaluation {
                reason: format!("typing into '{}' failed: {}", selector, e),
            })?;

        self.dispatch_input_events(selector);
        Ok(())
    }

    /// Dispatch input and change events on the element so SPA state
    /// picks up programmatic edits.
    pub fn dispatch_input_events(&self, selector: &str) {
        self.eval_discard(&format!(
            "(function() {{ const el = document.querySelector({}); if (el) {{ \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); }} }})()",
            js_string(selector)
        ));
    }

    pub fn press_enter(&self) -> Result<(), SessionError> {
        self.tab
            .press_key("Enter")
            .map_err(|e| SessionError::Evaluation {
                reason: format!("Enter key failed: {}", e),
            })?;
        Ok(())
    }

    /// Submit the form owning the element, preferring requestSubmit so
    /// submit handlers run.
    pub fn submit_owning_form(&self, selector: &str) {
        self.eval_discard(&format!(
            "(function() {{ const el = document.querySelector({}); \
             if (el && el.form) {{ el.form.requestSubmit ? el.form.requestSubmit() : el.form.submit(); }} }})()",
            js_string(selector)
        ));
    }

    /// Let in-flight rendering and network activity settle.
    pub fn settle(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Register a tap observing every outgoing request on this tab.
    /// Requests are always allowed through unmodified.
    pub fn install_request_tap<F>(&self, tap: F) -> Result<(), SessionError>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        let patterns = vec![RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_Type: None,
            request_stage: Some(RequestStage::Request),
        }];

        self.tab
            .enable_fetch(Some(&patterns), None)
            .map_err(|e| SessionError::Evaluation {
                reason: format!("failed to enable request interception: {}", e),
            })?;

        let interceptor: Arc<dyn RequestInterceptor + Send + Sync> = Arc::new(
            move |_transport: Arc<Transport>,
                  _session_id: SessionId,
                  event: RequestPausedEvent|
                  -> RequestPausedDecision {
                let request = &event.params.request;
                tap(&request.method, &request.url);
                RequestPausedDecision::Continue(None)
            },
        );

        self.tab
            .enable_request_interception(interceptor)
            .map_err(|e| SessionError::Evaluation {
                reason: format!("failed to register request interceptor: {}", e),
            })?;

        debug!("[Session] Request tap installed");
        Ok(())
    }

    /// Best-effort dismissal of overlays that block interaction
    /// (welcome banners, cookie-consent bars, drawer backdrops).
    pub fn dismiss_overlays(&self) {
        const OVERLAY_SELECTORS: &[&str] = &[
            "button[aria-label='Close Welcome Banner']",
            ".cc-btn.cc-dismiss",
            "button[aria-label*='close']",
            ".cdk-overlay-backdrop",
            "mat-sidenav-container .mat-drawer-backdrop",
        ];

        for selector in OVERLAY_SELECTORS {
            if self.selector_matches(selector) {
                if let Err(e) = self.click(selector) {
                    debug!("[Session] Overlay '{}' did not dismiss: {}", selector, e);
                }
            }
        }

        if let Err(e) = self.tab.press_key("Escape") {
            debug!("[Session] Escape press failed: {}", e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            warn!("[Session] Tab close failed: {}", e);
        }
    }
}

/// Encode a Rust string as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
