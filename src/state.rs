// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::collections::HashSet;

use crate::types::CookieRecord;

/// Mutable bookkeeping for a single crawl run.
///
/// Owned exclusively by the spider for the duration of one `run()`;
/// reset at the start of every run and never shared across crawls.
#[derive(Debug, Default)]
pub struct CrawlRuntimeState {
    /// URLs already navigated to (terminal state per URL).
    pub visited_urls: HashSet<String>,

    /// Every URL ever observed, visited or not.
    pub seen_urls: HashSet<String>,

    /// Dedupe keys for registered XSS forms: (submit URL, ordered field identifiers).
    pub xss_seen: HashSet<(String, Vec<String>)>,

    /// URLs produced by the directory-enumeration pass.
    pub enum_urls: HashSet<String>,

    /// Cookies captured at session bootstrap, re-applied on navigation.
    pub initial_cookies: Vec<CookieRecord>,

    /// SPA navigation candidates already clicked this run.
    pub clicked_router_links: HashSet<String>,
}

impl CrawlRuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
