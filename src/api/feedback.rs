use crate::db::queries::feedback::{
    assign_feedback_technician, create_feedback, export_feedback, get_all_feedback,
    get_feedback_stats, get_my_feedback, get_technician_feedback, reply_to_feedback,
};
use axum::{
    routing::{get, put},
    Router,
};
use sqlx::PgPool;

pub fn feedback_routes() -> Router<PgPool> {
    Router::new()
        .route("/feedback", get(get_all_feedback).post(create_feedback))
        .route("/feedback/user", get(get_my_feedback))
        .route("/feedback/technician", get(get_technician_feedback))
        .route("/feedback/stats", get(get_feedback_stats))
        .route("/feedback/export", get(export_feedback))
        .route("/feedback/{id}/reply", put(reply_to_feedback))
        .route(
            "/feedback/{id}/assign-technician",
            put(assign_feedback_technician),
        )
}
