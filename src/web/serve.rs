use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::world::World;

fn router(world: Arc<World>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(HeaderValue::from_static("http://127.0.0.1:8000"));

    Router::new()
        .route("/", get(|| async { "voxelcraft" }))
        .route("/dimensions", get(dimensions))
        .with_state(world)
        .layer(cors)
}

/// Serves the status endpoint until the listener fails.
pub(crate) async fn init(world: Arc<World>, port: u16) -> std::io::Result<()> {
    info!("Starting up web server on port {port}...");
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
    axum::serve(listener, router(world).into_make_service()).await
}

async fn dimensions(State(world): State<Arc<World>>) -> impl IntoResponse {
    let stats = world.stats().await;
    if stats.is_empty() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(stats));
    }
    (StatusCode::OK, Json(stats))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::world::visibility::VisibilityConfig;
    use voxelcraft_lib::web::dto::DimensionStats;

    #[tokio::test]
    async fn dimensions_lists_running_dimensions() {
        let world = World::init("world", Arc::new(MemoryStorage::new()), VisibilityConfig::default())
            .await
            .unwrap();
        let world = Arc::new(world);
        let response = dimensions(State(world.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stats: Vec<DimensionStats> = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name, "overworld");
        assert_eq!(stats[0].loaded_chunks, 0);
        world.shutdown().await;
    }
}
