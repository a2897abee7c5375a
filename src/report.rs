// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Reconnaissance Report
 * Crawl output artifact shared between pipeline stages
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{CookieRecord, FieldInfo};

/// A form (or loose-input pseudo-form) registered for XSS testing.
///
/// Wire names keep the legacy report vocabulary so existing downstream
/// tooling keeps parsing the file unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XssForm {
    #[serde(rename = "url_de_envio")]
    pub submit_url: String,

    #[serde(rename = "campos")]
    pub fields: Vec<FieldInfo>,
}

/// Structured data produced by the reconnaissance stage.
///
/// Append-only while a crawl runs; immutable once returned. The sorted
/// set containers give the report file its stable, sorted arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconReport {
    #[serde(rename = "seed_url", default)]
    pub seed_url: String,

    #[serde(rename = "urls_descobertas", default)]
    pub discovered_urls: BTreeSet<String>,

    #[serde(rename = "alvos_para_sqli", default)]
    pub sqli_targets: BTreeSet<String>,

    #[serde(rename = "alvos_para_xss", default)]
    pub xss_forms: Vec<XssForm>,

    #[serde(rename = "alvos_para_access", default)]
    pub access_targets: BTreeSet<String>,

    #[serde(default)]
    pub cookies: Vec<CookieRecord>,
}

impl ReconReport {
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize recon report")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report from {}", path.display()))?;
        serde_json::from_str(&raw).context("Failed to parse recon report")
    }

    // ------------------------------------------------------------------
    // Read-only projections consumed by collaborator scanners
    // ------------------------------------------------------------------

    pub fn as_sql_targets(&self) -> SqlTargetsArtifact {
        SqlTargetsArtifact {
            targets: self.sqli_targets.iter().cloned().collect(),
            cookies: self.cookies.clone(),
        }
    }

    pub fn as_xss_targets(&self) -> XssTargetsArtifact {
        XssTargetsArtifact {
            origin_url: self.seed_url.clone(),
            forms: self.xss_forms.clone(),
            cookies: self.cookies.clone(),
        }
    }

    pub fn as_access_targets(&self) -> AccessTargetsArtifact {
        AccessTargetsArtifact {
            urls: self.access_targets.iter().cloned().collect(),
            cookies: self.cookies.clone(),
        }
    }
}

/// Input data required to execute SQL injection scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlTargetsArtifact {
    pub targets: Vec<String>,
    pub cookies: Vec<CookieRecord>,
}

/// Information required to run the XSS scanners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XssTargetsArtifact {
    pub origin_url: String,
    pub forms: Vec<XssForm>,
    pub cookies: Vec<CookieRecord>,
}

/// Input data for the access-control analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTargetsArtifact {
    pub urls: Vec<String>,
    pub cookies: Vec<CookieRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldParts;

    fn field(name: &str) -> FieldInfo {
        FieldParts {
            name: Some(name.to_string()),
            ..Default::default()
        }
        .into_field_info()
        .unwrap()
    }

    #[test]
    fn test_wire_format_keys() {
        let mut report = ReconReport::new("http://target/");
        report.discovered_urls.insert("http://target/b".to_string());
        report.discovered_urls.insert("http://target/a".to_string());
        report.sqli_targets.insert("http://target/items?id=FUZZ".to_string());
        report.xss_forms.push(XssForm {
            submit_url: "http://target/login".to_string(),
            fields: vec![field("email"), field("password")],
        });
        report.cookies.push(CookieRecord::new("token", "abc"));

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["seed_url"], "http://target/");
        let urls = value["urls_descobertas"].as_array().unwrap();
        // BTreeSet serializes sorted
        assert_eq!(urls[0], "http://target/a");
        assert_eq!(urls[1], "http://target/b");
        assert_eq!(value["alvos_para_sqli"][0], "http://target/items?id=FUZZ");
        assert_eq!(value["alvos_para_xss"][0]["url_de_envio"], "http://target/login");
        assert_eq!(
            value["alvos_para_xss"][0]["campos"][0]["identifier"],
            "email"
        );
        assert!(value["alvos_para_access"].as_array().unwrap().is_empty());
        assert_eq!(value["cookies"][0]["name"], "token");
    }

    #[test]
    fn test_round_trip() {
        let mut report = ReconReport::new("http://target/");
        report.access_targets.insert("http://target/admin".to_string());
        report.xss_forms.push(XssForm {
            submit_url: "http://target/#/search".to_string(),
            fields: vec![field("q")],
        });

        let json = report.to_json().unwrap();
        let loaded: ReconReport = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.seed_url, report.seed_url);
        assert_eq!(loaded.access_targets, report.access_targets);
        assert_eq!(loaded.xss_forms, report.xss_forms);
    }

    #[test]
    fn test_projections_are_read_only_copies() {
        let mut report = ReconReport::new("http://target/");
        report.sqli_targets.insert("http://target/?q=FUZZ".to_string());
        report.cookies.push(CookieRecord::new("token", "abc"));

        let sql = report.as_sql_targets();
        assert_eq!(sql.targets, vec!["http://target/?q=FUZZ"]);
        assert_eq!(sql.cookies.len(), 1);

        let access = report.as_access_targets();
        assert!(access.urls.is_empty());

        // Mutating the projection must not touch the report
        let mut xss = report.as_xss_targets();
        xss.cookies.clear();
        assert_eq!(report.cookies.len(), 1);
    }

    #[test]
    fn test_empty_attribute_serialization_is_sparse() {
        let info = field("email");
        let json = serde_json::to_value(&info).unwrap();
        let attrs = json["attributes"].as_object().unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["name"], "email");
    }
}
