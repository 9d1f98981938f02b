mod cli;

use patterncast::{config, encoder, server, store::SegmentStore, supervisor};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;

async fn start_server(
    host: String,
    port: u16,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting patterncast server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    tracing::info!("Segment directory: {:?}", config.stream.output_dir);

    let store = SegmentStore::new(config.stream.output_dir.clone());
    let encoder_config = encoder::EncoderConfig::from_config(&config.stream, &config.overlay);
    let timings = supervisor::SupervisorTimings::from_config(&config.stream);
    let supervisor = supervisor::StreamSupervisor::new(encoder_config, store, timings);

    // Kick the stream off at boot when configured; failure is logged, not
    // fatal, since the stream can still be started over HTTP.
    if config.stream.auto_start {
        let boot_supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            match boot_supervisor.start().await {
                Ok(()) => tracing::info!("Boot-time stream start succeeded"),
                Err(e) => tracing::error!("Boot-time stream start failed: {e}"),
            }
        });
    }

    server::start_server(config, supervisor).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "patterncast=trace,tower_http=debug".to_string()
        } else {
            "patterncast=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("patterncast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external encoder...\n");

    let info = encoder::tools::check_encoder(&config.stream.encoder);
    let status = if info.available { "✓" } else { "✗" };

    print!("{} {}", status, info.name);
    if let Some(ref version) = info.version {
        print!(" ({})", version);
    }
    if let Some(ref path) = info.path {
        print!(" - {}", path.display());
    }
    println!();

    println!();
    if info.available {
        println!("Encoder is available!");
    } else {
        println!("Encoder is missing. Install it (or point [stream].encoder at it) to stream.");
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!(
                "  Stream: {}x{}@{} -> {:?}",
                config.stream.width,
                config.stream.height,
                config.stream.frame_rate,
                config.stream.output_dir
            );
            println!(
                "  Segments: {}s x {} retained",
                config.stream.segment_duration_secs, config.stream.playlist_size
            );
            println!("  Auto-start: {}", config.stream.auto_start);
            println!("  Direct pass-through: {}", config.direct.enabled);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
