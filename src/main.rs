use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

use homeserve_backend::api;
use homeserve_backend::api::auth::AuthDoc;
use homeserve_backend::config::Config;
use homeserve_backend::db::pool::get_db_pool;
use homeserve_backend::db::queries::announcement::AnnouncementDoc;
use homeserve_backend::db::queries::booking::BookingDoc;
use homeserve_backend::db::queries::feedback::FeedbackDoc;
use homeserve_backend::db::queries::inventory::InventoryDoc;
use homeserve_backend::db::queries::service::ServiceDoc;
use homeserve_backend::db::queries::user::UserDoc;
use homeserve_backend::middleware::auth::{create_permission_cache, jwt_middleware, rbac_middleware};
use homeserve_backend::middleware::request_logger::track_requests;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(true).init();

    Config::init();
    let config = Config::get();

    let pool = get_db_pool().await;
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let permission_cache = create_permission_cache();

    let merged_doc = AuthDoc::openapi()
        .merge_from(UserDoc::openapi())
        .merge_from(ServiceDoc::openapi())
        .merge_from(BookingDoc::openapi())
        .merge_from(InventoryDoc::openapi())
        .merge_from(FeedbackDoc::openapi())
        .merge_from(AnnouncementDoc::openapi());

    let public_routes = Router::new().merge(api::auth::auth_routes());

    let private_routes = Router::new()
        .merge(api::auth::secure_auth_routes())
        .merge(api::user::user_routes())
        .merge(api::service::service_routes())
        .merge(api::booking::booking_routes())
        .merge(api::inventory::inventory_routes())
        .merge(api::feedback::feedback_routes())
        .merge(api::announcement::announcement_routes())
        .route_layer(from_fn_with_state(pool.clone(), rbac_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .layer(Extension(permission_cache.clone()))
        .with_state(pool.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    run_server(app, &config.bind_addr, shutdown_tx, pool).await;
    info!("Shutdown complete.");
}

async fn shutdown_signal(mut shutdown_rx: broadcast::Receiver<()>, pool: PgPool) {
    tokio::select! {
        _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down..."),
        _ = shutdown_rx.recv() => info!("Received shutdown signal."),
    }
    info!("Closing database pool...");
    pool.close().await;
    info!("Database pool closed. Server shutting down.");
}

async fn run_server(app: Router, bind_addr: &str, shutdown_tx: broadcast::Sender<()>, pool: PgPool) {
    let listener = TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind listener");
    info!("Server running at http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.subscribe(), pool))
        .await
        .expect("Server encountered an error");
}
