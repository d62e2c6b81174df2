use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "timebridge", about = "Natural-language calendar assistant")]
pub struct Cli {
    /// Path to a KEY=VALUE config file (falls back to the CONFIG_FILE env var)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message through the assistant and print the response
    Chat {
        message: String,
        /// IANA timezone for this request (e.g. America/New_York)
        #[arg(long)]
        timezone: Option<String>,
    },
}
