//! Crowsnest CLI - watch assigned GitHub issues and dispatch a coding assistant.

use std::io::IsTerminal;
use std::process;

use clap::Parser;
use crowsnest::cli::Cli;
use crowsnest::config::Config;
use crowsnest::tui::run_tui;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    // The dashboard needs a real terminal; in pipelines we print a notice
    // and exit cleanly instead of entering the poll loop
    if !std::io::stdin().is_terminal() {
        println!("crowsnest - GitHub issue monitor");
        println!("Interactive features require a TTY terminal");
        return;
    }

    if let Err(e) = run_tui(config).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
