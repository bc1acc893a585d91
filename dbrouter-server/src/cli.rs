use clap::{Parser, Subcommand};
use std::net::IpAddr;

pub const DEFAULT_PORT: u16 = 8046;

#[derive(Parser)]
#[command(
    name = "dbrouter",
    about = "dbrouter Server - health-aware database router daemon",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "DBROUTER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(short, long, env = "DBROUTER_BIND", default_value = "127.0.0.1")]
    pub bind: IpAddr,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the status API server (default if no command specified)")]
    Serve,

    #[command(about = "Check every configured store once and print the router status")]
    Status {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Exit non-zero unless a healthy master is available")]
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["dbrouter"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.port, DEFAULT_PORT);
    }

    #[test]
    fn test_status_json_flag() {
        let cli = Cli::try_parse_from(["dbrouter", "--port", "9000", "status", "--json"]).unwrap();
        assert_eq!(cli.port, 9000);
        assert!(matches!(cli.command, Some(Commands::Status { json: true })));
    }
}
