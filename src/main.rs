use clap::Parser;
use log::debug;

use commander::cli::Cli;
use commander::config::CommanderConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // init logger
    env_logger::Builder::from_default_env()
        .filter_level(cli.log_filter())
        .init();

    let config = match CommanderConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load config: {e}");
            std::process::exit(1);
        }
    };
    debug!("using commander directory {}", config.commander_directory.display());

    if let Err(e) = cli.command.execute(config).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
