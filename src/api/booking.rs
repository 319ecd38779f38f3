use crate::db::queries::booking::{
    assign_technician, change_booking_status, create_booking, delete_booking, get_available_technicians,
    get_booking, get_bookings, get_my_bookings, get_technician_bookings, update_booking,
};
use axum::{
    routing::{get, put},
    Router,
};
use sqlx::PgPool;

pub fn booking_routes() -> Router<PgPool> {
    Router::new()
        .route("/bookings", get(get_bookings).post(create_booking))
        .route("/bookings/user", get(get_my_bookings))
        .route("/bookings/technician", get(get_technician_bookings))
        .route(
            "/bookings/technicians/available",
            get(get_available_technicians),
        )
        .route(
            "/bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .route("/bookings/{id}/status", put(change_booking_status))
        .route("/bookings/{id}/assign-technician", put(assign_technician))
}
