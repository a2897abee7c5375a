// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Seitti - Reconnaissance & Blind-XSS Confirmation Scanner
 * Crawls an authorized target, derives injection candidates and
 * confirms blind XSS through an out-of-band callback listener.
 *
 * (c) 2026 Bountyy Oy
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use seitti_scanner::browser::BrowserSession;
use seitti_scanner::callback_server::{CallbackServer, PayloadTracker};
use seitti_scanner::config::ScanConfig;
use seitti_scanner::crawler::Spider;
use seitti_scanner::report::ReconReport;
use seitti_scanner::scanners::xss_scanner::{InjectionRecord, XssScanner};

/// Seitti - Reconnaissance & Blind-XSS Confirmation Scanner
#[derive(Parser)]
#[command(name = "seitti")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version = "1.0.0")]
#[command(about = "Recon crawler with out-of-band blind-XSS confirmation.", long_about = None)]
struct Cli {
    /// Target URL. Scan only environments you are authorized to test.
    target: String,

    /// Output path for the recon report (JSON)
    #[arg(short, long, default_value = "recon_report.json")]
    report: PathBuf,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Session cookie to reuse an authenticated account (name=value)
    #[arg(long, env = "SEITTI_SESSION_COOKIE")]
    session_cookie: Option<String>,

    /// E-mail for automatic login
    #[arg(long, env = "SEITTI_LOGIN_EMAIL")]
    email: Option<String>,

    /// Password for automatic login
    #[arg(long, env = "SEITTI_LOGIN_PASSWORD")]
    password: Option<String>,

    /// Port for the blind-XSS callback listener
    #[arg(long, default_value = "8000", env = "SEITTI_CALLBACK_PORT")]
    callback_port: u16,

    /// Externally reachable listener base URL baked into payloads
    #[arg(long)]
    listener_url: Option<String>,

    /// Wordlist for directory enumeration (packaged default if unset)
    #[arg(long)]
    wordlist: Option<PathBuf>,

    /// Seconds to keep listening for late callbacks after injection
    #[arg(long, default_value = "10")]
    callback_wait: u64,

    /// Crawl only; skip the XSS confirmation phases
    #[arg(long)]
    skip_xss: bool,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    print!("\x1b[92m");
    println!("               _ __  __  _");
    println!("   ________  (_) /_/ /_(_)");
    println!("  / ___/ _ \\/ / __/ __/ /");
    print!("\x1b[91m");
    println!(" (__  )  __/ / /_/ /_/ /");
    println!("/____/\\___/_/\\__/\\__/_/");
    print!("\x1b[0m");
    println!();
    print!("\x1b[1m\x1b[97m");
    println!("   Recon Crawler & Blind-XSS Confirmation");
    print!("\x1b[0m\x1b[92m");
    println!("        v1.0 - (c) 2026 Bountyy Oy");
    print!("\x1b[0m");
    println!();

    let cli = Cli::parse();

    info!("Seitti Scanner v1.0.0 - Starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("seitti-worker")
        .max_blocking_threads(64)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = ScanConfig::load(&cli.target, cli.report.clone())
        .context("Invalid scan configuration")?;

    if cli.headless {
        config.headless = true;
    }
    if cli.session_cookie.is_some() {
        config.session_cookie = cli.session_cookie.clone();
    }
    if cli.email.is_some() {
        config.auth_email = cli.email.clone();
    }
    if cli.password.is_some() {
        config.auth_password = cli.password.clone();
    }
    config.callback_port = cli.callback_port;
    if cli.listener_url.is_some() {
        config.listener_url = cli.listener_url.clone();
    }
    if cli.wordlist.is_some() {
        config.wordlist = cli.wordlist.clone();
    }

    // The listener outlives crawl and injection; bind failure is fatal.
    let tracker = Arc::new(PayloadTracker::new());
    let server = CallbackServer::start(config.callback_port, Arc::clone(&tracker))
        .await
        .context("Failed to start callback listener")?;
    info!(
        "[Callback] Payload callbacks expected at {}",
        config.listener_url()
    );

    let (report, injected) = run_pipeline(config.clone(), Arc::clone(&tracker), cli.skip_xss)
        .await
        .context("Scan pipeline failed")?;

    if !injected.is_empty() && cli.callback_wait > 0 {
        info!(
            "[Callback] Waiting {}s for out-of-band confirmations",
            cli.callback_wait
        );
        tokio::time::sleep(Duration::from_secs(cli.callback_wait)).await;
    }

    if let Err(e) = server.stop().await {
        warn!("[Callback] Listener stop: {}", e);
    }

    report
        .save(&config.report_path)
        .context("Failed to write recon report")?;
    info!("Report written to {}", config.report_path.display());

    info!("    URLs discovered      : {}", report.discovered_urls.len());
    info!("    Forms for XSS        : {}", report.xss_forms.len());
    info!("    SQLi candidates      : {}", report.sqli_targets.len());
    info!("    Access targets       : {}", report.access_targets.len());
    info!("    Cookies captured     : {}", report.cookies.len());
    info!("    Payloads injected    : {}", injected.len());

    let executed = tracker.executed_payloads();
    if executed.is_empty() {
        info!("    Confirmed executions : 0");
    } else {
        info!("    Confirmed executions : {}", executed.len());
        for payload in &executed {
            info!(
                "    [CONFIRMED] payload {} field {:?} at {} (callback {:?})",
                payload.payload_id, payload.field_name, payload.origin_url, payload.callback_id
            );
        }
    }

    Ok(())
}

/// Crawl, then echo/inject. The browser automation API is synchronous,
/// so the whole sequential pipeline runs on a blocking thread while
/// the callback listener stays live on the runtime.
async fn run_pipeline(
    config: ScanConfig,
    tracker: Arc<PayloadTracker>,
    skip_xss: bool,
) -> Result<(ReconReport, Vec<InjectionRecord>)> {
    let listener_url = config.listener_url();

    tokio::task::spawn_blocking(move || -> Result<(ReconReport, Vec<InjectionRecord>)> {
        let session = BrowserSession::launch(config.headless, config.navigation_timeout())
            .context("Failed to launch browser automation engine")?;

        let spider = Spider::new(config.clone())?;
        let report = spider.run(&session);

        if skip_xss {
            return Ok((report, Vec::new()));
        }

        let mut scanner =
            XssScanner::new(&session, tracker, &listener_url, &config.target_url);
        let injected = scanner.run(&report.as_xss_targets());

        Ok((report, injected))
    })
    .await
    .context("Scan task panicked")?
}
