// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// reviewkit: desktop harness for the in-app review orchestrator.
//
// Entry point. Initialises logging, loads settings, picks a platform bridge,
// and pumps JSON-lines method calls from stdin to stdout.

mod services;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use reviewkit_bridge::scripted::ScriptedBridge;
use reviewkit_bridge::traits::ReviewPlatform;
use reviewkit_core::types::StoreTarget;
use reviewkit_core::{ReviewConfig, ReviewError};

use services::config_dir::default_config_path;
use services::harness::Harness;

#[derive(Debug, Parser)]
#[command(name = "reviewkit", version, about = "Drive the in-app review orchestrator over JSON lines")]
struct Cli {
    /// Settings file (JSON). Missing file means defaults.
    #[arg(long, env = "REVIEWKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Use a simulated platform where every native call succeeds.
    #[arg(long)]
    simulate: bool,

    /// Start with no context or activity attached.
    #[arg(long)]
    detached: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ReviewError> {
    // stdout carries responses, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = ReviewConfig::load(&config_path)?;
    tracing::info!(path = %config_path.display(), "reviewkit starting");

    let platform: Arc<dyn ReviewPlatform> = if cli.simulate {
        let store = config.store_target.unwrap_or(StoreTarget::PlayStore);
        Arc::new(ScriptedBridge::new(store))
    } else {
        reviewkit_bridge::platform_bridge()
    };

    let mut harness = Harness::new(platform, config, !cli.detached);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    harness.run(stdin, tokio::io::stdout()).await
}
