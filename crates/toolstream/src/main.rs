use clap::Parser;
use eyre::Result;

use toolstream::cli::{Cli, Commands};
use toolstream::commands::{Command, chat::ChatCommand, models::ModelsCommand};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Load .env before parsing so env-backed flags see its values
    toolstream::cli::config::load_env()?;

    let cli = Cli::parse();

    toolstream::logging::init_tracing(cli.debug)?;

    match cli.command {
        Commands::Chat {
            prompt,
            system_prompt,
            json,
            transcript,
        } => {
            let command = ChatCommand {
                prompt,
                model: cli.model,
                catalogs: cli.catalogs,
                base_url: cli.base_url,
                api_key: cli.api_key,
                system_prompt,
                json,
                transcript,
            };
            command.execute().await
        }
        Commands::Models => {
            let command = ModelsCommand {
                catalogs: cli.catalogs,
            };
            command.execute().await
        }
    }
}
