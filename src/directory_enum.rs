// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Directory enumeration backed by the external `ffuf` fuzzer.
//!
//! Narrow contract: `enumerate(base_url, cookies) -> set of URLs`,
//! failing closed with a typed error when the tool is missing or
//! errors. The spider degrades to an empty result set.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::EnumerationError;
use crate::types::{build_cookie_header, CookieRecord};

/// Packaged fallback wordlist; used when no override is configured.
const DEFAULT_WORDLIST: &str = include_str!("../resources/common_dirs.txt");

const MATCH_CODES: &str = "200,401,403";
const THREADS: u32 = 15;
const RUN_TIMEOUT_SECS: u32 = 300;

#[derive(Debug, Deserialize)]
struct FfufOutput {
    #[serde(default)]
    results: Vec<FfufResult>,
}

#[derive(Debug, Deserialize)]
struct FfufResult {
    url: Option<String>,
    status: Option<i64>,
}

/// Execute ffuf against `<base_url>/FUZZ` and return discovered URLs.
pub fn enumerate(
    base_url: &str,
    cookies: &[CookieRecord],
    wordlist: Option<&Path>,
) -> Result<HashSet<String>, EnumerationError> {
    let (wordlist_path, _wordlist_guard) = resolve_wordlist(wordlist)?;

    let output_file = tempfile::NamedTempFile::new().map_err(|e| {
        EnumerationError::RunFailed {
            stderr: format!("failed to create output file: {}", e),
        }
    })?;

    let target = format!("{}/FUZZ", base_url.trim_end_matches('/'));
    let mut command = Command::new("ffuf");
    command
        .arg("-w")
        .arg(&wordlist_path)
        .arg("-u")
        .arg(&target)
        .arg("-mc")
        .arg(MATCH_CODES)
        .arg("-t")
        .arg(THREADS.to_string())
        .arg("-of")
        .arg("json")
        .arg("-o")
        .arg(output_file.path())
        .arg("-timeout")
        .arg(RUN_TIMEOUT_SECS.to_string());

    let cookie_header = build_cookie_header(cookies);
    if !cookie_header.is_empty() {
        command.arg("-H").arg(format!("Cookie: {}", cookie_header));
    }

    debug!("[Enum] Running ffuf against {}", target);

    let output = command.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EnumerationError::ToolUnavailable {
                reason: "ffuf not found on PATH".to_string(),
            }
        } else {
            EnumerationError::ToolUnavailable {
                reason: e.to_string(),
            }
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        return Err(EnumerationError::RunFailed {
            stderr: if stderr.is_empty() { stdout } else { stderr },
        });
    }

    let raw = std::fs::read_to_string(output_file.path()).map_err(|e| {
        EnumerationError::OutputParse {
            reason: format!("failed to read results file: {}", e),
        }
    })?;

    let discovered = parse_results(&raw)?;
    info!("[Enum] ffuf discovered {} path(s)", discovered.len());
    Ok(discovered)
}

/// Resolve the wordlist path, materializing the packaged default into
/// a temp file when no override is given. The guard keeps the temp
/// file alive for the duration of the run.
fn resolve_wordlist(
    wordlist: Option<&Path>,
) -> Result<(PathBuf, Option<tempfile::NamedTempFile>), EnumerationError> {
    match wordlist {
        Some(path) => {
            if !path.exists() {
                return Err(EnumerationError::WordlistMissing {
                    path: path.display().to_string(),
                });
            }
            Ok((path.to_path_buf(), None))
        }
        None => {
            let mut file = tempfile::NamedTempFile::new().map_err(|e| {
                EnumerationError::RunFailed {
                    stderr: format!("failed to materialize wordlist: {}", e),
                }
            })?;
            file.write_all(DEFAULT_WORDLIST.as_bytes()).map_err(|e| {
                EnumerationError::RunFailed {
                    stderr: format!("failed to write wordlist: {}", e),
                }
            })?;
            let path = file.path().to_path_buf();
            Ok((path, Some(file)))
        }
    }
}

fn parse_results(raw: &str) -> Result<HashSet<String>, EnumerationError> {
    let parsed: FfufOutput =
        serde_json::from_str(raw).map_err(|e| EnumerationError::OutputParse {
            reason: e.to_string(),
        })?;

    Ok(parsed
        .results
        .into_iter()
        .filter_map(|entry| match (entry.url, entry.status) {
            (Some(url), Some(_)) => Some(url),
            _ => None,
        })
        .collect())
}
