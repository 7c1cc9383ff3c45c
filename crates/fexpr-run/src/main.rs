use clap::Parser;

mod cli;
mod data;
mod logging;

#[tokio::main]
async fn main() -> miette::Result<()> {
    logging::init_tracing(&logging::LogConfig::from_env());
    let cli = cli::Cli::parse();
    tracing::debug!("cli: {cli:?}");

    cli.run().await
}
