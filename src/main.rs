use clap::Parser;
use poly_updown::cli::{Cli, Commands};
use poly_updown::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let force_paper = matches!(&cli.command, Commands::Run(args) if args.paper);
    let config = Config::from_environment(&cli.config, force_paper)?;

    // Initialize telemetry
    let _telemetry = poly_updown::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(
                mode = config.execution.mode.as_str(),
                profile = ?config.risk.profile,
                "Starting decision engine"
            );
            args.execute(config).await?;
        }
        Commands::Status(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
