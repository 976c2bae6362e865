use crate::core_command::ClientCommand;
use crate::session::CommandMode;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "rouilledl",
    about = "Download client for the dual-connection sentinel file transfer protocol."
)]
pub struct Cli {
    /// Server hostname or IP address
    pub hostname: String,

    /// Server control port
    pub port_control: u16,

    /// Local port the server connects back to for data
    pub port_data: u16,

    /// List the server's directory and exit
    #[arg(short = 'l', conflicts_with = "get")]
    pub list: bool,

    /// Download FILE_NAME and exit
    #[arg(short = 'g', value_name = "FILE_NAME")]
    pub get: Option<String>,

    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address announced to the server for data connections
    #[arg(short, long)]
    pub data_address: Option<IpAddr>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn command_mode(&self) -> CommandMode {
        if self.list {
            CommandMode::List
        } else if self.get.is_some() {
            CommandMode::Get
        } else {
            CommandMode::Shell
        }
    }

    /// The command to send in single-shot mode; `None` selects the shell.
    pub fn initial_command(&self) -> Option<ClientCommand> {
        if self.list {
            Some(ClientCommand::List)
        } else {
            self.get.clone().map(ClientCommand::Get)
        }
    }
}
