// src/server.rs
use std::net::SocketAddr;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{ExporterError, ExporterResult};
use crate::prober::ProberHandle;

// Reload the configuration and restart the probes
async fn reload(prober: web::Data<ProberHandle>) -> impl Responder {
    match prober.reload().await {
        Ok(()) => HttpResponse::Ok().body("Reloaded"),
        Err(e) => {
            error!("Reload failed: {}", e);
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

async fn method_not_allowed() -> impl Responder {
    HttpResponse::MethodNotAllowed().body("Method Not Allowed")
}

// Health check endpoint
async fn health() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// Routes of the control surface
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/-/reload")
            .route(web::post().to(reload))
            .route(web::put().to(reload))
            .default_service(web::to(method_not_allowed)),
    )
    .route("/health", web::get().to(health));
}

/// Serve until `shutdown` is cancelled, then stop gracefully.
pub async fn serve(
    addr: SocketAddr,
    prober: ProberHandle,
    shutdown: CancellationToken,
) -> ExporterResult<()> {
    let data = web::Data::new(prober);

    let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .disable_signals()
        .bind(addr)
        .map_err(|e| ExporterError::ServerError(format!("Failed to bind {}: {}", addr, e)))?
        .run();

    info!("Listening on {}", addr);

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        handle.stop(true).await;
    });

    server
        .await
        .map_err(|e| ExporterError::ServerError(format!("HTTP server failed: {}", e)))
}
