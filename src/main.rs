use clap::Parser;
use kagami::config::Config;
use kagami::proxy::KagamiProxy;
use kagami::state::LazyState;
use pingora::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;
use std::sync::Arc;

/// Kagami - AI media generation gateway built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "kagami")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn exit_with(message: String) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Load and validate configuration
    let config = Config::from_file(&args.config)
        .unwrap_or_else(|e| exit_with(format!("Failed to load configuration: {}", e)));
    if let Err(e) = config.validate() {
        exit_with(format!("Invalid configuration: {}", e));
    }

    // Initialize logging subsystem
    if let Err(e) = kagami::logging::init_subscriber(config.server.log_format) {
        exit_with(format!("Failed to initialize logging subsystem: {}", e));
    }

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        providers = config.providers.len(),
        presets = config.watermark.presets.len(),
        "Configuration loaded successfully"
    );

    if args.test {
        tracing::info!("Configuration test passed");
        return;
    }

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt))
        .unwrap_or_else(|e| exit_with(format!("Failed to create Pingora server: {}", e)));
    server.bootstrap();

    // Backends connect on the first request, after any daemon fork
    let proxy = KagamiProxy::new(Arc::new(LazyState::new(config.clone())));
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);

    let listen_addr = format!("{}:{}", config.server.address, config.server.port);
    proxy_service.add_tcp(&listen_addr);
    proxy_service.threads = Some(config.server.threads);

    tracing::info!(
        address = %listen_addr,
        threads = config.server.threads,
        "Starting Kagami gateway"
    );

    server.add_service(proxy_service);

    server.run_forever();
}
