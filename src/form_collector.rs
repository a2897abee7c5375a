// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Form Collector
 * Extracts form and input metadata for the SQLi and XSS stages
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::browser::BrowserSession;
use crate::report::{ReconReport, XssForm};
use crate::state::CrawlRuntimeState;
use crate::targeting::TargetFilter;
use crate::types::{FieldInfo, FieldParts};

const FORMS_JS: &str = r#"
    (function() {
        const results = [];
        function partsOf(el) {
            return {
                name: el.getAttribute('name'),
                id: el.getAttribute('id'),
                aria: el.getAttribute('aria-label'),
                placeholder: el.getAttribute('placeholder'),
                testid: el.getAttribute('data-testid'),
                type: el.getAttribute('type'),
                tag: el.tagName.toLowerCase()
            };
        }
        document.querySelectorAll('form').forEach(form => {
            const fields = [];
            form.querySelectorAll('input, textarea, select').forEach(el => {
                fields.push(partsOf(el));
            });
            results.push({
                action: form.getAttribute('action'),
                method: (form.getAttribute('method') || 'GET').toUpperCase(),
                fields: fields
            });
        });
        return JSON.stringify(results);
    })()
"#;

const LOOSE_INPUTS_JS: &str = r#"
    (function() {
        const results = [];
        document.querySelectorAll('input, textarea, select').forEach(el => {
            if (el.closest('form')) return;
            results.push({
                name: el.getAttribute('name'),
                id: el.getAttribute('id'),
                aria: el.getAttribute('aria-label'),
                placeholder: el.getAttribute('placeholder'),
                testid: el.getAttribute('data-testid'),
                type: el.getAttribute('type'),
                tag: el.tagName.toLowerCase()
            });
        });
        return JSON.stringify(results);
    })()
"#;

/// Raw form data as returned by in-page extraction.
#[derive(Debug, Deserialize)]
struct RawForm {
    action: Option<String>,
    method: Option<String>,
    fields: Vec<FieldParts>,
}

pub struct FormCollector {
    filter: Arc<TargetFilter>,
}

impl FormCollector {
    pub fn new(filter: Arc<TargetFilter>) -> Self {
        Self { filter }
    }

    /// Extract `<form>` elements and loose inputs from the rendered
    /// page and register them on the report.
    pub fn collect_from_page(
        &self,
        session: &BrowserSession,
        base_url: &str,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) {
        match session.eval_json(FORMS_JS) {
            Ok(value) => {
                let forms: Vec<RawForm> = serde_json::from_value(value).unwrap_or_default();
                for form in forms {
                    self.process_form(form, base_url, report, state);
                }
            }
            Err(e) => debug!("[Spider] Form extraction failed on {}: {}", base_url, e),
        }

        match session.eval_json(LOOSE_INPUTS_JS) {
            Ok(value) => {
                let fields: Vec<FieldParts> = serde_json::from_value(value).unwrap_or_default();
                self.process_loose_inputs(fields, base_url, report, state);
            }
            Err(e) => debug!("[Spider] Loose input extraction failed on {}: {}", base_url, e),
        }
    }

    /// Static-HTML fallback used when the live DOM is unavailable.
    pub fn collect_from_html(
        &self,
        html: &str,
        base_url: &str,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) {
        let document = Html::parse_document(html);
        let form_selector = Selector::parse("form").unwrap();
        let input_selector = Selector::parse("input, textarea, select").unwrap();

        for form_element in document.select(&form_selector) {
            let fields = form_element
                .select(&input_selector)
                .map(field_parts_from_element)
                .collect();

            let raw = RawForm {
                action: form_element.value().attr("action").map(String::from),
                method: form_element.value().attr("method").map(|m| m.to_uppercase()),
                fields,
            };
            self.process_form(raw, base_url, report, state);
        }

        let loose: Vec<FieldParts> = document
            .select(&input_selector)
            .filter(|element| !inside_form(element))
            .map(field_parts_from_element)
            .collect();
        self.process_loose_inputs(loose, base_url, report, state);
    }

    /// Register a single out-of-form input as a one-field pseudo-form
    /// so the XSS pipeline can still test it.
    pub fn register_field(
        &self,
        url: &str,
        field: FieldInfo,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) {
        self.add_xss_form(url, vec![field], report, state);
    }

    // ------------------------------------------------------------------
    // Internal processing shared by the page and HTML paths
    // ------------------------------------------------------------------

    fn process_form(
        &self,
        raw: RawForm,
        base_url: &str,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) {
        let fields: Vec<FieldInfo> = raw
            .fields
            .into_iter()
            .filter(|parts| !parts.is_ignored_input())
            .filter_map(FieldParts::into_field_info)
            .collect();

        if fields.is_empty() {
            return;
        }

        let submit_url = resolve_submit_url(base_url, raw.action.as_deref());
        let method = raw.method.as_deref().unwrap_or("GET").to_uppercase();

        if method == "GET" {
            self.register_sqli_candidate(&submit_url, &fields, report);
        }
        self.add_xss_form(&submit_url, fields, report, state);
    }

    fn process_loose_inputs(
        &self,
        fields: Vec<FieldParts>,
        page_url: &str,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) {
        for parts in fields {
            if parts.is_ignored_input() {
                continue;
            }
            if let Some(field) = parts.into_field_info() {
                self.register_field(page_url, field, report, state);
            }
        }
    }

    /// Register a form under its dedupe key. Re-registering the same
    /// (URL, identifier tuple) is a no-op.
    fn add_xss_form(
        &self,
        url: &str,
        fields: Vec<FieldInfo>,
        report: &mut ReconReport,
        state: &mut CrawlRuntimeState,
    ) {
        if !self.filter.is_allowed(url) {
            return;
        }

        let mut unique_fields: Vec<FieldInfo> = Vec::new();
        let mut identifiers: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for field in fields {
            if !seen.insert(field.identifier.clone()) {
                continue;
            }
            identifiers.push(field.identifier.clone());
            unique_fields.push(field);
        }

        if unique_fields.is_empty() {
            return;
        }

        let key = (url.to_string(), identifiers);
        if !state.xss_seen.insert(key) {
            return;
        }

        report.xss_forms.push(XssForm {
            submit_url: url.to_string(),
            fields: unique_fields,
        });
    }

    /// GET forms expose their parameters in the URL; join the named
    /// fields as FUZZ placeholders for the SQLi stage.
    fn register_sqli_candidate(
        &self,
        submit_url: &str,
        fields: &[FieldInfo],
        report: &mut ReconReport,
    ) {
        let mut param_names: Vec<&str> = Vec::new();
        for field in fields {
            if let Some(name) = field.attributes.name.as_deref() {
                if !name.is_empty() && !param_names.contains(&name) {
                    param_names.push(name);
                }
            }
        }

        if param_names.is_empty() {
            return;
        }

        let base_url = submit_url.split('#').next().unwrap_or(submit_url);
        if !self.filter.is_allowed(base_url) {
            return;
        }

        let join_char = if base_url.contains('?') { '&' } else { '?' };
        let query = param_names
            .iter()
            .map(|name| format!("{}=FUZZ", name))
            .collect::<Vec<_>>()
            .join("&");

        report
            .sqli_targets
            .insert(format!("{}{}{}", base_url, join_char, query));
    }
}

fn resolve_submit_url(base_url: &str, action: Option<&str>) -> String {
    let action = match action {
        Some(action) if !action.is_empty() => action,
        _ => return base_url.to_string(),
    };

    match Url::parse(base_url).and_then(|base| base.join(action)) {
        Ok(joined) => joined.to_string(),
        Err(_) => base_url.to_string(),
    }
}

fn field_parts_from_element(element: ElementRef) -> FieldParts {
    let value = element.value();
    FieldParts {
        name: value.attr("name").map(String::from),
        id: value.attr("id").map(String::from),
        aria: value.attr("aria-label").map(String::from),
        placeholder: value.attr("placeholder").map(String::from),
        testid: value.attr("data-testid").map(String::from),
        r#type: value.attr("type").map(String::from),
        tag: Some(value.name().to_lowercase()),
    }
}

fn inside_form(element: &ElementRef) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .map(|e| e.name() == "form")
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> FormCollector {
        let filter = Arc::new(TargetFilter::for_target("http://t/").unwrap());
        FormCollector::new(filter)
    }

    fn fresh() -> (ReconReport, CrawlRuntimeState) {
        (ReconReport::new("http://t/"), CrawlRuntimeState::new())
    }

    #[test]
    fn test_login_form_collection() {
        let c = collector();
        let (mut report, mut state) = fresh();

        let html = r#"
            <form action="/login" method="post">
                <input type="email" name="email" />
                <input type="password" name="password" />
                <input type="hidden" name="csrf" value="tok" />
                <button type="submit">Sign in</button>
            </form>
        "#;

        c.collect_from_html(html, "http://t/login", &mut report, &mut state);

        assert_eq!(report.xss_forms.len(), 1);
        let form = &report.xss_forms[0];
        assert_eq!(form.submit_url, "http://t/login");
        let ids: Vec<&str> = form.fields.iter().map(|f| f.identifier.as_str()).collect();
        assert_eq!(ids, vec!["email", "password"]);
        // POST form: no parameter-join SQLi candidate
        assert!(report.sqli_targets.is_empty());
    }

    #[test]
    fn test_duplicate_form_registered_once() {
        let c = collector();
        let (mut report, mut state) = fresh();

        let html = r#"
            <form action="/search">
                <input type="text" name="q" />
            </form>
        "#;

        c.collect_from_html(html, "http://t/", &mut report, &mut state);
        c.collect_from_html(html, "http://t/", &mut report, &mut state);

        let matching = report
            .xss_forms
            .iter()
            .filter(|f| f.submit_url == "http://t/search")
            .count();
        assert_eq!(matching, 1);
    }

    #[test]
    fn test_get_form_yields_fuzz_candidate() {
        let c = collector();
        let (mut report, mut state) = fresh();

        let html = r#"
            <form action="/search" method="GET">
                <input type="text" name="q" />
                <select name="category"><option value="a">A</option></select>
            </form>
        "#;

        c.collect_from_html(html, "http://t/", &mut report, &mut state);

        assert!(report
            .sqli_targets
            .contains("http://t/search?q=FUZZ&category=FUZZ"));
    }

    #[test]
    fn test_form_without_usable_fields_discarded() {
        let c = collector();
        let (mut report, mut state) = fresh();

        let html = r#"
            <form action="/noop">
                <input type="hidden" name="csrf" />
                <input type="submit" value="Go" />
            </form>
        "#;

        c.collect_from_html(html, "http://t/", &mut report, &mut state);
        assert!(report.xss_forms.is_empty());
    }

    #[test]
    fn test_loose_input_becomes_pseudo_form() {
        let c = collector();
        let (mut report, mut state) = fresh();

        let html = r#"
            <div class="toolbar">
                <input type="text" id="mat-input-1" placeholder="Search..." aria-label="Search" />
            </div>
        "#;

        c.collect_from_html(html, "http://t/#/search", &mut report, &mut state);

        assert_eq!(report.xss_forms.len(), 1);
        let form = &report.xss_forms[0];
        assert_eq!(form.submit_url, "http://t/#/search");
        assert_eq!(form.fields[0].identifier, "placeholder::Search...");
    }

    #[test]
    fn test_missing_action_defaults_to_page_url() {
        let c = collector();
        let (mut report, mut state) = fresh();

        let html = r#"<form><textarea name="comment"></textarea></form>"#;
        c.collect_from_html(html, "http://t/feedback", &mut report, &mut state);

        assert_eq!(report.xss_forms[0].submit_url, "http://t/feedback");
    }

    #[test]
    fn test_foreign_action_rejected() {
        let c = collector();
        let (mut report, mut state) = fresh();

        let html = r#"
            <form action="http://evil.example/collect">
                <input type="text" name="card" />
            </form>
        "#;
        c.collect_from_html(html, "http://t/", &mut report, &mut state);

        assert!(report.xss_forms.is_empty());
        assert!(report.sqli_targets.is_empty());
    }

    #[test]
    fn test_fields_deduplicated_within_form() {
        let c = collector();
        let (mut report, mut state) = fresh();

        let html = r#"
            <form action="/dup">
                <input type="text" name="q" />
                <input type="text" name="q" />
            </form>
        "#;
        c.collect_from_html(html, "http://t/", &mut report, &mut state);

        assert_eq!(report.xss_forms[0].fields.len(), 1);
    }
}
