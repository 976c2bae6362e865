mod client;
mod config;
mod constants;
mod core_cli;
mod core_command;
mod core_error;
mod core_log;
mod core_network;
mod core_transfer;
mod helpers;
mod session;

use crate::client::ClientParams;
use crate::config::Config;
use crate::constants::USAGE_LINES;
use crate::core_cli::Cli;
use crate::core_log::logger::init_logger;
use crate::core_network::resolve::{detect_data_address, resolve_server};
use crate::helpers::report_error;
use crate::session::SessionEnd;
use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            std::process::exit(0);
        }
        Err(_) => {
            for line in USAGE_LINES {
                println!("{}", line);
            }
            std::process::exit(1);
        }
    };

    init_logger(args.verbose);

    let code = match run_client(args).await {
        Ok(end) => end.exit_code(),
        Err(e) => {
            report_error(&format!("{:#}", e));
            1
        }
    };
    std::process::exit(code);
}

async fn run_client(args: Cli) -> Result<SessionEnd> {
    let config = Config::load(args.config.as_deref())?;

    let server = resolve_server(&args.hostname, args.port_control).await?;
    let data_address = args.data_address.unwrap_or_else(detect_data_address);

    println!(
        "Initiating download client with \nserver socket \t{}, and \ndata socket {}:{}",
        server, data_address, args.port_data
    );

    let params = ClientParams {
        server,
        data_address,
        data_port: args.port_data,
        mode: args.command_mode(),
        command: args.initial_command(),
    };

    client::run(params, Arc::new(config.client)).await
}
