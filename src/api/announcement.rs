use crate::db::queries::announcement::{
    create_announcement, delete_announcement, get_all_announcements, get_announcements,
    update_announcement,
};
use axum::{
    routing::{get, put},
    Router,
};
use sqlx::PgPool;

pub fn announcement_routes() -> Router<PgPool> {
    Router::new()
        .route(
            "/announcements",
            get(get_announcements).post(create_announcement),
        )
        .route("/announcements/admin", get(get_all_announcements))
        .route(
            "/announcements/{id}",
            put(update_announcement).delete(delete_announcement),
        )
}
