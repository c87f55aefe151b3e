//! API server setup.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use super::routes;
use crate::alarm::AlarmController;
use crate::capture::PHOTO_URL_PREFIX;
use crate::tracing::prelude::*;

/// State shared with every handler.
#[derive(Clone)]
pub struct SharedState {
    pub controller: AlarmController,
}

#[derive(OpenApi)]
#[openapi(
    info(title = "earshot", description = "Sound-triggered alarm controller"),
    tags((name = "alarm", description = "Alarm status and control")),
)]
struct ApiDoc;

/// Build the full application router: API, OpenAPI docs and the photo
/// directory.
pub fn router(state: SharedState, photo_dir: &Path) -> Router {
    let (api, openapi) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::routes())
        .split_for_parts();

    api.with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .nest_service(PHOTO_URL_PREFIX, ServeDir::new(photo_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` is cancelled, then finish in-flight requests.
pub async fn serve(
    addr: SocketAddr,
    state: SharedState,
    photo_dir: &Path,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind API server to {addr}"))?;
    info!(%addr, "API server listening");

    axum::serve(listener, router(state, photo_dir))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("API server failed")?;

    debug!("API server stopped");
    Ok(())
}
