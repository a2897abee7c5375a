// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Comprehensive Error Types
 * Production-ready error handling with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

/// Main scanner error type with comprehensive error variants
#[derive(Error, Debug)]
pub enum ScannerError {
    /// Browser session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Callback listener errors
    #[error("Callback error: {0}")]
    Callback(#[from] CallbackError),

    /// Directory enumeration errors
    #[error("Enumeration error: {0}")]
    Enumeration(#[from] EnumerationError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// General errors
    #[error("Scanner error: {0}")]
    General(String),
}

/// Browser session errors. Launch failure is the only fatal variant in
/// the recon pipeline; everything else is recoverable per-operation.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to launch browser automation engine: {reason}")]
    BrowserLaunch { reason: String },

    #[error("Failed to open browser tab: {reason}")]
    TabCreation { reason: String },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("No element matched selector chain for field '{field}'")]
    ElementNotFound { field: String },

    #[error("Script evaluation failed: {reason}")]
    Evaluation { reason: String },

    #[error("Cookie operation failed: {reason}")]
    Cookie { reason: String },
}

/// Callback listener errors. Bind failure aborts the scan; everything
/// received on the wire is handled best-effort.
#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("Failed to bind callback listener on port {port}: {reason}")]
    Bind { port: u16, reason: String },

    #[error("Callback listener did not shut down within {grace:?}")]
    ShutdownTimeout { grace: Duration },

    #[error("Callback listener task failed: {reason}")]
    Task { reason: String },
}

/// Raised when the external enumeration tool is missing or fails.
/// The spider treats this as an empty result set.
#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("Enumeration tool not available: {reason}")]
    ToolUnavailable { reason: String },

    #[error("Wordlist not found: {path}")]
    WordlistMissing { path: String },

    #[error("Enumeration run failed: {stderr}")]
    RunFailed { stderr: String },

    #[error("Failed to parse enumeration output: {reason}")]
    OutputParse { reason: String },
}

impl ScannerError {
    /// True when the error must abort the entire run. Only the browser
    /// engine and the callback listener are load-bearing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScannerError::Session(SessionError::BrowserLaunch { .. })
                | ScannerError::Callback(CallbackError::Bind { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let launch = ScannerError::Session(SessionError::BrowserLaunch {
            reason: "chrome not found".to_string(),
        });
        assert!(launch.is_fatal());

        let bind = ScannerError::Callback(CallbackError::Bind {
            port: 8000,
            reason: "address in use".to_string(),
        });
        assert!(bind.is_fatal());

        let nav = ScannerError::Session(SessionError::Navigation {
            url: "http://target/".to_string(),
            reason: "net::ERR_CONNECTION_REFUSED".to_string(),
        });
        assert!(!nav.is_fatal());

        let enumeration = ScannerError::Enumeration(EnumerationError::ToolUnavailable {
            reason: "ffuf missing from PATH".to_string(),
        });
        assert!(!enumeration.is_fatal());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = SessionError::NavigationTimeout {
            url: "http://target/slow".to_string(),
            timeout: Duration::from_secs(8),
        };
        let msg = err.to_string();
        assert!(msg.contains("http://target/slow"));
        assert!(msg.contains("8s"));
    }
}
