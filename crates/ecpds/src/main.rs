// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ECPDS master control plane.
//!
//! This is the binary entry point: it loads the configuration and either
//! serves the control plane or prints the effective configuration.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod prometheus;
mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// ECPDS master control plane.
#[derive(Parser, Debug)]
#[command(name = "ecpds", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the master: ticket repository, proxy, state machine and gateway.
    Serve,
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ecpds_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            ecpds_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("ecpds: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("ecpds: cannot render configuration: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("ecpds: use --help for available commands");
        }
    }
}
