mod config;
mod diagnosis;
mod routes;
mod upload;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use config::ServerConfig;
use diagnosis::catalog::DiseaseCatalog;
use diagnosis::resolver::LabelResolver;
use routes::configure_routes;
use std::env;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Configuration error: {}", e),
            ));
        }
    };

    let catalog = match DiseaseCatalog::load(config.catalog_path.as_deref()) {
        Ok(catalog) => catalog,
        Err(e) => {
            log::error!("Failed to load disease catalog at startup: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Catalog loading failed: {}", e),
            ));
        }
    };
    match &config.catalog_path {
        Some(path) => log::info!("Disease catalog loaded from {}", path.display()),
        None => log::info!("Using built-in disease catalog"),
    }
    log::info!(
        "{} diseases, {} keyword rules",
        catalog.len(),
        catalog.rules().len()
    );

    let resolver = LabelResolver::new(Arc::new(catalog));
    let detection = config.detection.clone();
    if !detection.delay.is_zero() {
        log::info!("Simulated processing delay: {:?}", detection.delay);
    }
    if let Some(seed) = detection.seed {
        log::warn!("DETECTION_SEED={} set; every request replays the same draws", seed);
    }

    let static_dir = match config.static_dir.clone() {
        Some(dir) if dir.is_dir() => {
            log::info!("Serving web UI from {}", dir.display());
            Some(dir)
        }
        Some(dir) => {
            log::warn!("STATIC_DIR {} is not a directory; web UI disabled", dir.display());
            None
        }
        None => None,
    };

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::ACCEPT_LANGUAGE,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(resolver.clone()))
            .app_data(web::Data::new(detection.clone()))
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
