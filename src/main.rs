mod cli;

use stillcast::{config, server};
use stillcast_common::paths::is_http_url;
use stillcast_common::{JobDescriptor, SlideshowSpec};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting Stillcast server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "stillcast=trace,stillcast_av=trace,stillcast_common=debug,tower_http=debug".to_string()
        } else {
            "stillcast=debug,stillcast_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
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
        Commands::Fingerprint {
            urls,
            duration,
            loop_count,
        } => fingerprint(urls, duration, loop_count),
        Commands::Version => {
            println!("stillcast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let ffmpeg = config
        .encoder
        .ffmpeg_path
        .clone()
        .unwrap_or_else(|| "ffmpeg".into());

    let tools = stillcast_av::check_tools(&ffmpeg);
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it or set encoder.ffmpeg_path.");
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Stream prefix: {}", config.server.stream_prefix);
    println!("  Stream directory: {}", config.cache.base_dir.display());
    println!("  Capacity: {} encoder(s)", config.cache.capacity);
    println!(
        "  Encode: {}x{} @ {} fps, {}s segments",
        config.encoder.width, config.encoder.height, config.encoder.fps, config.encoder.segment_secs
    );
    println!(
        "  Video search: {}",
        if config.sources.resolved_youtube_api_key().is_some() {
            "enabled"
        } else {
            "disabled (no API key)"
        }
    );

    Ok(())
}

fn fingerprint(urls: Vec<String>, duration: u32, loop_count: u32) -> Result<()> {
    let descriptor = match urls.as_slice() {
        [single] if is_http_url(single) => JobDescriptor::url(single.clone()),
        [single] => JobDescriptor::path(single.clone()),
        _ => JobDescriptor::Slideshow(SlideshowSpec::new(urls, duration, loop_count)),
    };
    descriptor.validate()?;

    println!("{}", descriptor.key());
    Ok(())
}
