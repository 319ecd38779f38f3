use crate::db::queries::user::{
    create_address, delete_address, get_addresses, get_all_users, get_profile, get_technicians,
    update_profile,
};
use axum::{
    routing::{delete, get},
    Router,
};
use sqlx::PgPool;

pub fn user_routes() -> Router<PgPool> {
    Router::new()
        .route("/users", get(get_all_users))
        .route("/users/technicians", get(get_technicians))
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/addresses", get(get_addresses).post(create_address))
        .route("/users/addresses/{id}", delete(delete_address))
}
