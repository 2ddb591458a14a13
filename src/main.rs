use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commentscope::app::AppContext;
use commentscope::cli::{commands, Cli, Commands};
use commentscope::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON results
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Commands::Validate { url } = &cli.command {
        commands::validate(url)?;
        return Ok(());
    }

    let mut config = Config::load()?;
    if let Commands::Scrape { args, .. } = &cli.command {
        args.apply(&mut config.scraping);
    }

    let mut ctx = AppContext::launch(config).await?;
    if let Some(workers) = cli.verify_workers {
        ctx = ctx.with_verify_workers(workers)?;
    }
    ctx.cancel.cancel_on_signal();

    match cli.command {
        Commands::Scrape { url, args } => {
            let options = ctx.config.scraping.clone();
            commands::scrape(&ctx, &url, &options, !args.no_verify, &args.filters()).await?;
        }
        Commands::PostInfo { url } => {
            commands::post_info(&ctx, &url).await?;
        }
        Commands::CheckShare {
            post_url,
            profile_url,
        } => {
            commands::check_share(&ctx, &post_url, &profile_url).await?;
        }
        Commands::Validate { .. } => {}
    }

    Ok(())
}
