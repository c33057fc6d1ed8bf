mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --debug wins over RUST_LOG; logs go to stderr so stdout stays scriptable
    let filter = if cli.global.debug {
        EnvFilter::new("tavor=debug,tavor_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Run(args) => commands::run::execute(args, &cli.global).await?,
        cli::Commands::Exec(args) => commands::exec::execute(args, &cli.global).await?,
        cli::Commands::Create(args) => commands::create::execute(args, &cli.global).await?,
        cli::Commands::List(args) => commands::list::execute(args, &cli.global).await?,
        cli::Commands::Stop(args) => commands::stop::execute(args, &cli.global).await?,
        cli::Commands::Pause(args) => commands::pause::execute(args, &cli.global).await?,
        cli::Commands::Resume(args) => commands::pause::resume(args, &cli.global).await?,
        cli::Commands::Expose(args) => commands::expose::execute(args, &cli.global).await?,
        cli::Commands::Url(args) => commands::url::execute(args, &cli.global).await?,
    }

    Ok(())
}
