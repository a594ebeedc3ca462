pub mod attendance;
pub mod auth;
pub mod config;
pub mod course;
pub mod err;
pub mod models;
pub mod professor;
pub mod routes;
pub mod seed;
pub mod service;
pub mod store;
pub mod student;

use std::path::Path;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::config::Config;
use crate::err::Error;
use crate::service::AttendanceService;
use crate::store::{DocumentStore, MemoryStore, PgStore};

pub type Payload<T> = Result<(StatusCode, Json<T>), Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::OK, Json(value)))
}

pub fn created<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::CREATED, Json(value)))
}

pub fn breaks<V>(err: Error) -> Payload<V>
where
    V: Serialize,
{
    Err(err)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::load()?;

    let pg = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url, config.database_max_connections).await?;
            log::info!("Connected to document database");
            Some(pg)
        }
        None => None,
    };
    let store: Arc<dyn DocumentStore> = match &pg {
        Some(pg) => Arc::new(pg.clone()),
        None => Arc::new(MemoryStore::new()),
    };

    let service = AttendanceService::new(store);
    if config.seed_sample_data {
        log::warn!("SEED_SAMPLE_DATA is set, replacing stored documents with sample data");
        seed::load_sample_data(&service, Path::new(&config.seed_image_dir)).await?;
    }
    let app = routes::router(service, &config);

    let addr = config.socket_addr();
    log::info!("Starting attendance HTTP server on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pg) = pg {
        pg.close().await;
    }
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
