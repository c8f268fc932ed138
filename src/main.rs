mod cli;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

use overture::extract::YtDlpResolver;
use overture::{config, context, pipeline, plex, store, tasks};

async fn start(config: config::Config) -> Result<()> {
    tracing::info!("Starting overture");

    let resolver = Arc::new(YtDlpResolver::discover(config.themes.prefer_mp4a_codec)?);
    let ctx = context::AppContext::new(config, resolver)?;

    if !ctx.plex.test_connection().await.unwrap_or(false) {
        tracing::warn!("Plex server is not reachable yet; continuing anyway");
    }

    store::migrations::run_pending(&ctx).await;

    let _workers = pipeline::spawn_workers(&ctx);
    let _listener = plex::listener::spawn(ctx.clone());
    let _schedules = tasks::spawn(&ctx);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}

async fn scan(config: config::Config) -> Result<()> {
    let resolver = Arc::new(YtDlpResolver::discover(config.themes.prefer_mp4a_codec)?);
    let ctx = context::AppContext::new(config, resolver)?;

    pipeline::scan_once(&ctx).await
}

fn validate(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}", config.plex.url);
            println!("  Token configured: {}", !config.plex.token.is_empty());
            println!("  Scheduled scans enabled: {}", config.themes.enabled);
            println!("  Scan interval: {} minutes", config.themes.update_interval_mins);
            println!("  Upload workers: {}", config.themes.upload_workers);
            println!("  Data directory: {:?}", config.themes.data_dir);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}", config.plex.url);
            println!("  Data directory: {:?}", config.themes.data_dir);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "overture=trace".to_string()
        } else {
            "overture=debug".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start(config))
        }
        Commands::Scan => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan(config))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate(path.as_deref())
        }
        Commands::Version => {
            println!("overture {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
