//! REST agent for Hyper-V virtual machine and checkpoint operations
//!
//! Configuration is loaded from config.toml in the working directory, or
//! from the path given as the first argument.

use api::{create_router, init_tracing, AppState, Config};
use hvops::HyperVManager;

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Warning: {}", e);
        Config::default()
    });

    // Initialize tracing
    init_tracing(&config.logging.level);

    tracing::info!(
        shell = %config.hyperv.shell,
        service = %config.hyperv.service.name,
        "Starting API server on {}:{}",
        config.server.host,
        config.server.port
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

async fn serve(config: Config) -> std::io::Result<()> {
    let state = std::sync::Arc::new(AppState::new(HyperVManager::from_config(&config.hyperv)));
    let app = create_router(state);

    let addr: std::net::SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await
}
