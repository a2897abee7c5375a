// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};

/// Input types that never carry attacker-controlled data and are
/// skipped during field collection.
pub const IGNORED_INPUT_TYPES: &[&str] = &["hidden", "submit", "button", "reset", "image"];

/// Identifying attributes captured for an input field. Only attributes
/// actually present on the element are recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_testid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// A single input field discovered by the crawler.
///
/// The identifier doubles as the dedupe key for the field and as the
/// seed for selector resolution in the XSS scanner; two fields with the
/// same identifier are the same logical input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub identifier: String,
    pub attributes: FieldAttributes,
}

/// Raw attribute values as read off a DOM element or HTML tag, before
/// identifier derivation. Both the rendered-page and static-HTML
/// extraction paths normalize into this.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldParts {
    pub name: Option<String>,
    pub id: Option<String>,
    pub aria: Option<String>,
    pub placeholder: Option<String>,
    pub testid: Option<String>,
    pub r#type: Option<String>,
    pub tag: Option<String>,
}

impl FieldParts {
    /// Derive the stable field identifier. Priority: name, then
    /// prefixed data-testid / placeholder / aria-label / id.
    pub fn identifier(&self) -> Option<String> {
        if let Some(name) = non_empty(&self.name) {
            return Some(name.to_string());
        }

        let prefixed = [
            (&self.testid, "data-testid::"),
            (&self.placeholder, "placeholder::"),
            (&self.aria, "aria::"),
        ];
        for (value, prefix) in prefixed {
            if let Some(value) = non_empty(value) {
                return Some(format!("{}{}", prefix, value));
            }
        }

        non_empty(&self.id).map(|id| format!("id::{}", id))
    }

    /// Build the full `FieldInfo`, or `None` when no identifying
    /// attribute exists at all.
    pub fn into_field_info(self) -> Option<FieldInfo> {
        let identifier = self.identifier()?;

        let attributes = FieldAttributes {
            name: self.name,
            id: self.id,
            aria_label: self.aria,
            placeholder: self.placeholder,
            data_testid: self.testid,
            r#type: self.r#type.map(|t| t.to_lowercase()),
            tag: self.tag.map(|t| t.to_lowercase()),
        };

        Some(FieldInfo {
            identifier,
            attributes,
        })
    }

    /// True for input elements whose type never carries user data.
    pub fn is_ignored_input(&self) -> bool {
        let tag = self.tag.as_deref().unwrap_or("").to_lowercase();
        if tag != "input" {
            return false;
        }
        let input_type = self.r#type.as_deref().unwrap_or("").to_lowercase();
        IGNORED_INPUT_TYPES.contains(&input_type.as_str())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// A browser cookie scoped to the target, as captured from the
/// automation context and written into the recon report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CookieRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Join cookies into a `Cookie:` request header value.
pub fn build_cookie_header(cookies: &[CookieRecord]) -> String {
    cookies
        .iter()
        .filter(|c| !c.name.is_empty() && !c.value.is_empty())
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}
