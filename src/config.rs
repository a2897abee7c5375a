// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ScannerError;

fn default_navigation_timeout() -> u64 {
    8
}

fn default_callback_port() -> u16 {
    8000
}

fn default_login_email_selector() -> String {
    "input[name='email']".to_string()
}

fn default_login_password_selector() -> String {
    "input[name='password']".to_string()
}

/// Demo account used when neither a session cookie nor credentials are
/// configured. Matches the stock training-shop deployment.
pub const DEMO_EMAIL: &str = "admin@juice-sh.op";
pub const DEMO_PASSWORD: &str = "admin123";

/// Runtime options for a full scan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Crawl entry point; also defines the authorization scope.
    pub target_url: String,

    /// Where the recon report is written.
    pub report_path: PathBuf,

    /// Pre-authenticated session cookie as `name=value`.
    #[serde(default)]
    pub session_cookie: Option<String>,

    /// Credentials for the login bootstrap step.
    #[serde(default)]
    pub auth_email: Option<String>,

    #[serde(default)]
    pub auth_password: Option<String>,

    /// Override for the login page; defaults to `<target>/#/login`.
    #[serde(default)]
    pub login_url: Option<String>,

    #[serde(default = "default_login_email_selector")]
    pub login_email_selector: String,

    #[serde(default = "default_login_password_selector")]
    pub login_password_selector: String,

    #[serde(default)]
    pub headless: bool,

    /// Per-navigation timeout in seconds.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Port the blind-XSS callback listener binds on.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    /// Externally reachable base URL injected into payloads. Defaults
    /// to `http://<local-ip-or-localhost>:<callback_port>`.
    #[serde(default)]
    pub listener_url: Option<String>,

    /// Wordlist for directory enumeration; the packaged default is
    /// used when unset.
    #[serde(default)]
    pub wordlist: Option<PathBuf>,
}

impl ScanConfig {
    /// Build a config for the given target, folding in environment
    /// overrides (`SEITTI_*`).
    pub fn load(target_url: &str, report_path: PathBuf) -> Result<Self, ScannerError> {
        let target_url = target_url.trim_end_matches('/').to_string();
        Url::parse(&target_url).map_err(|e| {
            ScannerError::Configuration(format!("Invalid target URL '{}': {}", target_url, e))
        })?;

        let mut config = Self {
            target_url,
            report_path,
            session_cookie: None,
            auth_email: None,
            auth_password: None,
            login_url: None,
            login_email_selector: default_login_email_selector(),
            login_password_selector: default_login_password_selector(),
            headless: false,
            navigation_timeout_secs: default_navigation_timeout(),
            callback_port: default_callback_port(),
            listener_url: None,
            wordlist: None,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(cookie) = std::env::var("SEITTI_SESSION_COOKIE") {
            if !cookie.is_empty() {
                self.session_cookie = Some(cookie);
            }
        }
        if let Ok(email) = std::env::var("SEITTI_LOGIN_EMAIL") {
            if !email.is_empty() {
                self.auth_email = Some(email);
            }
        }
        if let Ok(password) = std::env::var("SEITTI_LOGIN_PASSWORD") {
            if !password.is_empty() {
                self.auth_password = Some(password);
            }
        }
        if let Ok(headless) = std::env::var("SEITTI_HEADLESS") {
            self.headless = matches!(headless.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(port) = std::env::var("SEITTI_CALLBACK_PORT") {
            if let Ok(port) = port.parse() {
                self.callback_port = port;
            }
        }
    }

    /// Login page for the credential and demo bootstrap steps.
    pub fn login_url(&self) -> String {
        match &self.login_url {
            Some(url) => url.clone(),
            None => format!("{}/#/login", self.target_url),
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Base URL the injected payloads will call back to.
    pub fn listener_url(&self) -> String {
        match &self.listener_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://127.0.0.1:{}", self.callback_port),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.auth_email.is_some() && self.auth_password.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ScanConfig::load("http://target.example:3000/", PathBuf::from("out.json"))
            .unwrap();
        assert_eq!(config.target_url, "http://target.example:3000");
    }

    #[test]
    fn test_invalid_target_rejected() {
        assert!(ScanConfig::load("not a url", PathBuf::from("out.json")).is_err());
    }

    #[test]
    fn test_derived_urls() {
        let config =
            ScanConfig::load("http://target.example:3000", PathBuf::from("out.json")).unwrap();
        assert_eq!(config.login_url(), "http://target.example:3000/#/login");
        assert_eq!(
            config.listener_url(),
            format!("http://127.0.0.1:{}", config.callback_port)
        );

        let mut config = config;
        config.listener_url = Some("http://callbacks.example:9000/".to_string());
        assert_eq!(config.listener_url(), "http://callbacks.example:9000");
    }
}
