// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod collaborators;
pub mod xss_scanner;

pub use collaborators::{AccessAnalyzer, Finding, SqliRunner, XssRunner};
pub use xss_scanner::{EchoFinding, EchoResult, EchoStatus, InjectionRecord, XssScanner};
