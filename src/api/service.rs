use crate::db::queries::service::{
    create_service, delete_service, get_service, get_services, update_service,
};
use axum::{routing::get, Router};
use sqlx::PgPool;

pub fn service_routes() -> Router<PgPool> {
    Router::new()
        .route("/services", get(get_services).post(create_service))
        .route(
            "/services/{id}",
            get(get_service).put(update_service).delete(delete_service),
        )
}
