use actix_web::{middleware::Condition, middleware::Logger, web, App, HttpServer};
use clap::Parser;
use log::{error, info};
use studio_media_rs::config::{Cli, Config};
use studio_media_rs::handlers::{self, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    if let Some(path) = &cli.sample_config {
        return Config::generate_sample_config(path)
            .map(|_| println!("Wrote sample configuration to {}", path.display()))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }

    // Load configuration first; a broken file stops startup
    let config = Config::load_from(&cli.config).map_err(|e| {
        eprintln!("Failed to load configuration from {}: {}", cli.config.display(), e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level)
    ).init();

    let state = match AppState::new(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!("Invalid compression settings: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    info!("Starting Studio Media Service v{}", env!("CARGO_PKG_VERSION"));
    info!("Server will listen on http://{}", config.bind_address());
    info!("Maximum payload size: {}MB", config.server.max_file_size_mb);
    info!("Size threshold: {} bytes", config.compression.size_threshold_bytes);
    info!("JPEG encoder: {}", config.compression.jpeg_encoder);
    info!("Default profile: {}", config.compression.default_profile);

    let bind_address = config.bind_address();
    let max_payload_size = config.max_file_size_bytes();
    let worker_threads = config.server.worker_threads;
    let enable_cors = config.server.enable_cors;
    let request_logging = config.logging.enable_request_logging;
    let state = web::Data::new(state);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::PayloadConfig::new(max_payload_size))
            .app_data(state.clone())
            .wrap(Condition::new(request_logging, Logger::default()))
            .wrap(Condition::new(
                enable_cors,
                actix_web::middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
                    .add(("Access-Control-Allow-Headers", "Content-Type, Authorization")),
            ))
            .configure(handlers::configure)
    });

    if let Some(workers) = worker_threads {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await
}
