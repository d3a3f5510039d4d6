mod init;
mod run;
mod status;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::errors::Result;

#[derive(Debug, Parser)]
#[command(
    name = "locbridge",
    version,
    about = "Geolocation and configuration bridge for a watch host runtime"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Run(RunArgs),
    Init,
    Status,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RunArgs {
    /// Host runtime socket to connect to, overriding the config file.
    #[arg(long)]
    pub socket_path: Option<String>,
    /// Configuration page URL, overriding the config file.
    #[arg(long)]
    pub configuration_url: Option<String>,
}

pub async fn dispatch() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run::execute(args).await?,
        Command::Init => init::execute().await?,
        Command::Status => status::execute().await?,
    }
    info!("command completed");
    Ok(())
}
