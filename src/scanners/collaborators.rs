// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Interfaces for the downstream scanner collaborators.
//!
//! The SQLi runner, the external XSS wrappers and the access-control
//! analyzer live outside this crate. Each consumes a read-only
//! projection of the recon report and returns findings; none of them
//! mutate the report.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::report::{AccessTargetsArtifact, SqlTargetsArtifact, XssTargetsArtifact};

/// A confirmed or suspected issue reported by a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Which collaborator produced the finding.
    pub scanner: String,
    /// The URL or form the finding applies to.
    pub target: String,
    pub detail: String,
}

impl Finding {
    pub fn new(
        scanner: impl Into<String>,
        target: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            scanner: scanner.into(),
            target: target.into(),
            detail: detail.into(),
        }
    }
}

/// SQL injection runner (sqlmap-style subprocess wrapper).
pub trait SqliRunner {
    fn scan(&self, targets: &SqlTargetsArtifact) -> Result<Vec<Finding>>;
}

/// External XSS scanner wrappers (Dalfox, XSSStrike).
pub trait XssRunner {
    fn scan(&self, targets: &XssTargetsArtifact) -> Result<Vec<Finding>>;
}

/// Access-control analyzer probing enumerated paths.
pub trait AccessAnalyzer {
    fn scan(&self, targets: &AccessTargetsArtifact) -> Result<Vec<Finding>>;
}
