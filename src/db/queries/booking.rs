use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use sqlx::types::Json as SqlJson;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::db::models::booking::{
    estimate_cost, AssignTechnician, AvailabilityQuery, Booking, BookingFilter, BookingStatus,
    InventoryLine, NewBooking, StatusChange, UpdateBooking, Urgency,
};
use crate::db::models::user::UserInfo;
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;

/// Builds the denormalized inventory snapshot for a new booking from the
/// current catalog rows. Unknown items and non-positive quantities are
/// rejected; prices are copied, not referenced.
async fn build_snapshot(
    pool: &PgPool,
    selected: &[crate::db::models::booking::SelectedItem],
) -> Result<Vec<InventoryLine>, ApiResponse<()>> {
    let mut lines = Vec::with_capacity(selected.len());
    for item in selected {
        if item.quantity <= 0 {
            return Err(ApiResponse::<()>::error(
                StatusCode::BAD_REQUEST,
                "Selected item quantity must be positive",
                Some(json!({ "inventory_id": item.inventory_id })),
            ));
        }

        #[derive(sqlx::FromRow)]
        struct CatalogRow {
            name: String,
            price: bigdecimal::BigDecimal,
        }

        let row = sqlx::query_as::<_, CatalogRow>(
            "SELECT name, price FROM inventory_items WHERE id = $1",
        )
        .bind(item.inventory_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read inventory catalog",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?
        .ok_or_else(|| {
            ApiResponse::<()>::error(
                StatusCode::BAD_REQUEST,
                "Selected inventory item does not exist",
                Some(json!({ "inventory_id": item.inventory_id })),
            )
        })?;

        lines.push(InventoryLine {
            inventory_id: item.inventory_id,
            name: row.name,
            unit_price: row.price,
            quantity: item.quantity,
        });
    }
    Ok(lines)
}

/// Creates a booking in `pending` with a cost estimate and inventory snapshot.
#[utoipa::path(
    post,
    path = "/bookings",
    request_body = NewBooking,
    responses(
        (status = 201, description = "Booking created", body = Booking),
        (status = 400, description = "Unknown service or invalid items"),
        (status = 403, description = "Technicians cannot create bookings")
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_booking(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Json(payload): Json<NewBooking>,
) -> Result<ApiResponse<Booking>, ApiResponse<()>> {
    if perms.is_technician() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Technicians cannot create bookings",
            None,
        ));
    }

    #[derive(sqlx::FromRow)]
    struct ServiceRow {
        base_price: bigdecimal::BigDecimal,
        active: bool,
    }

    let service = sqlx::query_as::<_, ServiceRow>(
        "SELECT base_price, active FROM services WHERE id = $1",
    )
    .bind(payload.service_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read service",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "Service does not exist", None)
    })?;

    if !service.active {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Service is no longer offered",
            None,
        ));
    }

    let snapshot = build_snapshot(&pool, &payload.selected_items).await?;
    let estimated_cost = estimate_cost(&service.base_price, &snapshot);

    let booking = sqlx::query_as::<_, Booking>(
        "INSERT INTO bookings
            (house_owner_id, service_id, scheduled_date, scheduled_time, urgency,
             address, description, estimated_cost, selected_inventory, payment_method)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING *",
    )
    .bind(perms.user_id)
    .bind(payload.service_id)
    .bind(payload.scheduled_date)
    .bind(payload.scheduled_time)
    .bind(payload.urgency.unwrap_or(Urgency::Normal))
    .bind(&payload.address)
    .bind(&payload.description)
    .bind(&estimated_cost)
    .bind(SqlJson(&snapshot))
    .bind(&payload.payment_method)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create booking",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Booking created successfully",
        booking,
    ))
}

/// Admin listing with optional filters and pagination.
#[utoipa::path(
    get,
    path = "/bookings",
    params(BookingFilter),
    responses(
        (status = 200, description = "Bookings retrieved", body = [Booking]),
        (status = 403, description = "Admin only")
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_bookings(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Query(filter): Query<BookingFilter>,
) -> Result<ApiResponse<Vec<Booking>>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can list all bookings",
            None,
        ));
    }

    let mut builder = QueryBuilder::new("SELECT * FROM bookings WHERE TRUE");
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(urgency) = filter.urgency {
        builder.push(" AND urgency = ").push_bind(urgency);
    }
    if let Some(technician_id) = filter.technician_id {
        builder.push(" AND technician_id = ").push_bind(technician_id);
    }
    if let Some(from) = filter.from {
        builder.push(" AND scheduled_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND scheduled_date <= ").push_bind(to);
    }
    builder.push(" ORDER BY scheduled_date, scheduled_time");
    builder
        .push(" LIMIT ")
        .push_bind(filter.limit.unwrap_or(100).clamp(1, 500));
    builder
        .push(" OFFSET ")
        .push_bind(filter.offset.unwrap_or(0).max(0));

    let bookings = builder
        .build_query_as::<Booking>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve bookings",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Bookings retrieved successfully",
        bookings,
    ))
}

/// Bookings created by the authenticated house owner.
#[utoipa::path(
    get,
    path = "/bookings/user",
    responses(
        (status = 200, description = "Own bookings", body = [Booking])
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_my_bookings(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<Booking>>, ApiResponse<()>> {
    let bookings = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE house_owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(perms.user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve bookings",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Bookings retrieved successfully",
        bookings,
    ))
}

/// Jobs assigned to the authenticated technician.
#[utoipa::path(
    get,
    path = "/bookings/technician",
    responses(
        (status = 200, description = "Assigned jobs", body = [Booking]),
        (status = 403, description = "Technicians only")
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_technician_bookings(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<Booking>>, ApiResponse<()>> {
    if !perms.is_technician() && !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only technicians have assigned jobs",
            None,
        ));
    }

    let bookings = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE technician_id = $1 ORDER BY scheduled_date, scheduled_time",
    )
    .bind(perms.user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve assigned jobs",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Assigned jobs retrieved successfully",
        bookings,
    ))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}",
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking retrieved", body = Booking),
        (status = 403, description = "Not yours to view"),
        (status = 404, description = "Booking not found")
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_booking(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Booking>, ApiResponse<()>> {
    let booking = fetch_booking(&pool, id).await?;

    if !perms.can_view_booking(booking.house_owner_id, booking.technician_id) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You are not allowed to view this booking",
            None,
        ));
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Booking retrieved successfully",
        booking,
    ))
}

async fn fetch_booking(pool: &PgPool, id: i32) -> Result<Booking, ApiResponse<()>> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database query failed",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Booking not found", None)
        })
}

/// Edits to scheduling/address/description are only honored while the
/// booking is still pending; payment fields are admin-editable anytime.
#[utoipa::path(
    put,
    path = "/bookings/{id}",
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    request_body = UpdateBooking,
    responses(
        (status = 200, description = "Booking updated", body = Booking),
        (status = 403, description = "Not yours to edit"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is no longer editable")
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_booking(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateBooking>,
) -> Result<ApiResponse<Booking>, ApiResponse<()>> {
    let booking = fetch_booking(&pool, id).await?;

    let is_owner = booking.house_owner_id == perms.user_id;
    if !is_owner && !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You are not allowed to edit this booking",
            None,
        ));
    }

    let wants_schedule_edit = payload.scheduled_date.is_some()
        || payload.scheduled_time.is_some()
        || payload.urgency.is_some()
        || payload.address.is_some()
        || payload.description.is_some();
    if wants_schedule_edit && booking.status != BookingStatus::Pending {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Only pending bookings can be rescheduled or edited",
            Some(json!({ "status": booking.status })),
        ));
    }

    if payload.payment_status.is_some() && !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can change the payment status",
            None,
        ));
    }

    let mut builder = QueryBuilder::new("UPDATE bookings SET updated_at = NOW()");
    if let Some(date) = payload.scheduled_date {
        builder.push(", scheduled_date = ").push_bind(date);
    }
    if let Some(time) = payload.scheduled_time {
        builder.push(", scheduled_time = ").push_bind(time);
    }
    if let Some(urgency) = payload.urgency {
        builder.push(", urgency = ").push_bind(urgency);
    }
    if let Some(address) = &payload.address {
        builder.push(", address = ").push_bind(address);
    }
    if let Some(description) = &payload.description {
        builder.push(", description = ").push_bind(description);
    }
    if let Some(payment_method) = &payload.payment_method {
        builder.push(", payment_method = ").push_bind(payment_method);
    }
    if let Some(payment_status) = payload.payment_status {
        builder.push(", payment_status = ").push_bind(payment_status);
    }
    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING *");

    let updated = builder
        .build_query_as::<Booking>()
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update booking",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Booking updated successfully",
        updated,
    ))
}

#[utoipa::path(
    delete,
    path = "/bookings/{id}",
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking deleted"),
        (status = 403, description = "Not yours to delete"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Active bookings cannot be deleted")
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_booking(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let booking = fetch_booking(&pool, id).await?;

    let is_owner = booking.house_owner_id == perms.user_id;
    if !is_owner && !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You are not allowed to delete this booking",
            None,
        ));
    }

    // Owners may only remove bookings that never ran or already ended;
    // admins may always delete.
    if !perms.is_admin()
        && !(booking.status == BookingStatus::Pending || booking.status.is_terminal())
    {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Accepted or running bookings must be cancelled first",
            Some(json!({ "status": booking.status })),
        ));
    }

    sqlx::query("DELETE FROM bookings WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete booking",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Booking deleted successfully",
        (),
    ))
}

/// Picks the free technician with the fewest active jobs for the slot and
/// claims the booking. The `technician_id IS NULL` guard makes the claim
/// idempotent under concurrent accepts.
async fn auto_assign_technician(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: i32,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<Option<i32>, sqlx::Error> {
    let candidate = sqlx::query_scalar::<_, i32>(
        "SELECT u.id
         FROM users u
         WHERE u.role = 'technician'
           AND NOT u.account_locked
           AND NOT EXISTS (
               SELECT 1 FROM bookings b
               WHERE b.technician_id = u.id
                 AND b.scheduled_date = $1
                 AND b.scheduled_time = $2
                 AND b.status IN ('accepted', 'in_progress')
           )
         ORDER BY (
             SELECT COUNT(*) FROM bookings b2
             WHERE b2.technician_id = u.id
               AND b2.status IN ('accepted', 'in_progress')
         ), u.id
         LIMIT 1",
    )
    .bind(date)
    .bind(time)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(technician_id) = candidate else {
        return Ok(None);
    };

    let claimed = sqlx::query(
        "UPDATE bookings SET technician_id = $1, updated_at = NOW()
         WHERE id = $2 AND technician_id IS NULL",
    )
    .bind(technician_id)
    .bind(booking_id)
    .execute(&mut **tx)
    .await?;

    Ok((claimed.rows_affected() == 1).then_some(technician_id))
}

/// Applies a lifecycle transition. The legal moves come from
/// `BookingStatus::next_states`; anything else is a 409 listing what would
/// have been allowed. Runs under a row lock so two admins acting at once
/// serialize instead of racing.
#[utoipa::path(
    put,
    path = "/bookings/{id}/status",
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    request_body = StatusChange,
    responses(
        (status = 200, description = "Transition applied", body = Booking),
        (status = 403, description = "Role does not permit this transition"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Illegal transition for current status")
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn change_booking_status(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusChange>,
) -> Result<ApiResponse<Booking>, ApiResponse<()>> {
    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let booking =
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database query failed",
                    Some(json!({ "db_error": e.to_string() })),
                )
            })?
            .ok_or_else(|| {
                ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Booking not found", None)
            })?;

    let target = payload.status;
    if !booking.status.can_transition_to(target) {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Illegal status transition",
            Some(json!({
                "current": booking.status,
                "requested": target,
                "allowed": booking.status.next_states(),
            })),
        ));
    }

    let permitted = match target {
        BookingStatus::Accepted | BookingStatus::Rejected => perms.can_review_bookings(),
        BookingStatus::InProgress | BookingStatus::Completed => {
            perms.can_work_booking(booking.technician_id)
        }
        BookingStatus::Cancelled => perms.can_cancel_booking(booking.house_owner_id),
        BookingStatus::Pending => false,
    };
    if !permitted {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Your role does not permit this transition",
            None,
        ));
    }

    // A booking cannot start without someone to do the work.
    if target == BookingStatus::InProgress && booking.technician_id.is_none() {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Booking has no technician assigned yet",
            None,
        ));
    }

    let mut auto_assigned = None;
    if target == BookingStatus::Accepted && booking.technician_id.is_none() {
        auto_assigned = auto_assign_technician(
            &mut tx,
            booking.id,
            booking.scheduled_date,
            booking.scheduled_time,
        )
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Technician auto-assignment failed",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;
    }

    let mut builder = QueryBuilder::new("UPDATE bookings SET updated_at = NOW(), status = ");
    builder.push_bind(target);
    match target {
        BookingStatus::Accepted => {
            builder.push(", accepted_at = NOW()");
        }
        BookingStatus::InProgress => {
            builder.push(", started_at = NOW()");
        }
        BookingStatus::Completed => {
            if let Some(notes) = &payload.completion_notes {
                builder.push(", completion_notes = ").push_bind(notes);
            }
        }
        _ => {}
    }
    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING *");

    let updated = builder
        .build_query_as::<Booking>()
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to apply status transition",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to commit transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let message = match (target, auto_assigned) {
        (BookingStatus::Accepted, Some(_)) => "Booking accepted and technician auto-assigned",
        (BookingStatus::Accepted, None) if updated.technician_id.is_none() => {
            "Booking accepted; awaiting technician assignment"
        }
        _ => "Booking status updated successfully",
    };

    Ok(ApiResponse::success(StatusCode::OK, message, updated))
}

/// Explicit technician assignment, idempotent per booking id: re-assigning
/// the same technician succeeds as a no-op, a different one while the slot
/// is taken is a conflict. Double-clicks therefore cannot double-assign.
#[utoipa::path(
    put,
    path = "/bookings/{id}/assign-technician",
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    request_body = AssignTechnician,
    responses(
        (status = 200, description = "Technician assigned", body = Booking),
        (status = 400, description = "Target is not an available technician"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Another technician already assigned")
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn assign_technician(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
    Json(payload): Json<AssignTechnician>,
) -> Result<ApiResponse<Booking>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can assign technicians",
            None,
        ));
    }

    let booking = fetch_booking(&pool, id).await?;

    if booking.status.is_terminal() {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Closed bookings cannot be reassigned",
            Some(json!({ "status": booking.status })),
        ));
    }

    // No-op if the same technician is already on the job.
    if booking.technician_id == Some(payload.technician_id) {
        return Ok(ApiResponse::success(
            StatusCode::OK,
            "Technician already assigned",
            booking,
        ));
    }
    if booking.technician_id.is_some() {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Another technician is already assigned",
            Some(json!({ "technician_id": booking.technician_id })),
        ));
    }

    let is_technician = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM users
            WHERE id = $1 AND role = 'technician' AND NOT account_locked
        )",
    )
    .bind(payload.technician_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;
    if !is_technician {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Target user is not an active technician",
            None,
        ));
    }

    let busy = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM bookings
            WHERE technician_id = $1
              AND scheduled_date = $2
              AND scheduled_time = $3
              AND status IN ('accepted', 'in_progress')
        )",
    )
    .bind(payload.technician_id)
    .bind(booking.scheduled_date)
    .bind(booking.scheduled_time)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;
    if busy {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Technician already has a booking at that slot",
            None,
        ));
    }

    let claimed = sqlx::query(
        "UPDATE bookings SET technician_id = $1, updated_at = NOW()
         WHERE id = $2 AND technician_id IS NULL",
    )
    .bind(payload.technician_id)
    .bind(id)
    .execute(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to assign technician",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    if claimed.rows_affected() == 0 {
        // Lost the race to a concurrent assignment.
        let current = fetch_booking(&pool, id).await?;
        if current.technician_id == Some(payload.technician_id) {
            return Ok(ApiResponse::success(
                StatusCode::OK,
                "Technician already assigned",
                current,
            ));
        }
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Another technician is already assigned",
            Some(json!({ "technician_id": current.technician_id })),
        ));
    }

    let updated = fetch_booking(&pool, id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Technician assigned successfully",
        updated,
    ))
}

/// Technicians presumed free at the given date + time slot.
#[utoipa::path(
    get,
    path = "/bookings/technicians/available",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Free technicians", body = [UserInfo]),
        (status = 403, description = "Admin only")
    ),
    tag = "Bookings",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_available_technicians(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<ApiResponse<Vec<UserInfo>>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can query technician availability",
            None,
        ));
    }

    let technicians = sqlx::query_as::<_, UserInfo>(
        "SELECT u.id, u.username, u.full_name, u.phone, u.role
         FROM users u
         WHERE u.role = 'technician'
           AND NOT u.account_locked
           AND NOT EXISTS (
               SELECT 1 FROM bookings b
               WHERE b.technician_id = u.id
                 AND b.scheduled_date = $1
                 AND b.scheduled_time = $2
                 AND b.status IN ('accepted', 'in_progress')
           )
         ORDER BY u.full_name",
    )
    .bind(query.date)
    .bind(query.time)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to query availability",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Available technicians retrieved successfully",
        technicians,
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_booking,
        get_bookings,
        get_my_bookings,
        get_technician_bookings,
        get_booking,
        update_booking,
        delete_booking,
        change_booking_status,
        assign_technician,
        get_available_technicians,
    ),
    components(
        schemas(
            Booking, NewBooking, UpdateBooking, StatusChange, AssignTechnician,
            BookingStatus, Urgency, InventoryLine
        )
    ),
    tags(
        (name = "Bookings", description = "Booking lifecycle and assignment")
    )
)]
pub struct BookingDoc;
