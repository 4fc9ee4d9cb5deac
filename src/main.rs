use std::{net::SocketAddr, process, sync::Arc};

use config::Config;
use log::{error, info};
use model::AppState;

mod auth;
mod config;
mod logger;
mod model;
mod routes;
mod templates;
mod validator;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = logger::init(config.log_level) {
        eprintln!("Failed to initialize logger: {}", err);
        process::exit(1);
    }

    let addr = config.addr;
    info!("Starting snippetbox server at {}", addr);

    let state = match AppState::build(config) {
        Ok(state) => Arc::new(state),
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    let app = routes::router(state);

    let server = axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!("Server error: {}", err);
        process::exit(1);
    }

    info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        // Never resolve, so the server keeps running
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
