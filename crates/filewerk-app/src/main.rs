// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filewerk: batch file conversion on your own machine.
//
// Entry point. Initialises logging, loads the configuration, wires Ctrl-C to
// batch cancellation, and runs the requested command.

mod catalog;
mod cli;
mod commands;
mod config;
mod render;
mod sitemap;

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use filewerk_core::human_errors::humanize_error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let app_config = config::load_or_default(&config_path);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling the batch");
            on_interrupt.cancel();
        }
    });

    match commands::execute(cli.command, &app_config, &config_path, cancel).await {
        Ok(outcome) => outcome.into(),
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            let human = humanize_error(&err);
            let _ = writeln!(std::io::stderr(), "{}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}
