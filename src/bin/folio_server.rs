//!
//! folio server binary
//! -------------------
//! Starts the portfolio HTTP front end. Configuration comes from FOLIO_* environment
//! variables, overridden by command-line flags.

use anyhow::Result;
use std::env;

use folio::config::{has_flag, FolioConfig};

#[tokio::main]
async fn main() -> Result<()> {
    println!(r"    ____      ___
   / __/___  / (_)___
  / /_/ __ \/ / / __ \
 / __/ /_/ / / / /_/ /
/_/  \____/_/_/\____/ ");

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("folio server\n\nUSAGE:\n  folio_server [--http-port N] [--bind HOST] [--scoring-url URL] [--scoring-timeout-ms N] [--expose-recovery-links] [--insecure-cookies]\n\nOPTIONS:\n  --http-port N              HTTP port (env: FOLIO_HTTP_PORT, default 7878)\n  --bind HOST                Bind address (env: FOLIO_BIND_HOST, default 0.0.0.0)\n  --scoring-url URL          AI scoring service base URL (env: FOLIO_SCORING_URL)\n  --scoring-timeout-ms N     Scoring request timeout (env: FOLIO_SCORING_TIMEOUT_MS, default 60000)\n  --expose-recovery-links    Return password reset links in responses instead of only logging them\n  --insecure-cookies         Omit the Secure attribute on session cookies (plain-http development)\n");
        return Ok(());
    }

    let mut config = FolioConfig::from_env();
    config.apply_args(&args);

    println!(
        "folio starting: http={}:{}, scoring={}",
        config.bind_host, config.http_port, config.scoring_url
    );
    tracing::info!(target: "folio::http", bind = %config.bind_host, port = config.http_port, scoring = %config.scoring_url, "starting");

    folio::server::run(config).await
}
