use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};

use crate::db::models::booking::BookingStatus;
use crate::db::models::feedback::{
    validate_comment, validate_rating, AdminReply, Feedback, FeedbackFilter, FeedbackStats,
    NewFeedback,
};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::export;

/// Submits feedback for a completed booking. The advisory client rules are
/// authoritative here: rating bounds, comment length per source, keyword
/// blocklist, ownership and one-per-booking uniqueness.
#[utoipa::path(
    post,
    path = "/feedback",
    request_body = NewFeedback,
    responses(
        (status = 201, description = "Feedback submitted", body = Feedback),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the booking owner"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Feedback already exists or booking not completed")
    ),
    tag = "Feedback",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_feedback(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Json(payload): Json<NewFeedback>,
) -> Result<ApiResponse<Feedback>, ApiResponse<()>> {
    validate_rating(payload.rating).map_err(|e| {
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, e.to_string(), None)
    })?;
    for sub in [
        payload.quality_rating,
        payload.punctuality_rating,
        payload.professionalism_rating,
    ]
    .into_iter()
    .flatten()
    {
        validate_rating(sub).map_err(|e| {
            ApiResponse::<()>::error(StatusCode::BAD_REQUEST, e.to_string(), None)
        })?;
    }
    if let Some(comment) = &payload.comment {
        validate_comment(comment, payload.source).map_err(|e| {
            ApiResponse::<()>::error(StatusCode::BAD_REQUEST, e.to_string(), None)
        })?;
    }

    #[derive(sqlx::FromRow)]
    struct BookingRow {
        house_owner_id: i32,
        technician_id: Option<i32>,
        service_id: i32,
        status: BookingStatus,
    }

    let booking = sqlx::query_as::<_, BookingRow>(
        "SELECT house_owner_id, technician_id, service_id, status FROM bookings WHERE id = $1",
    )
    .bind(payload.booking_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Booking not found", None))?;

    if booking.house_owner_id != perms.user_id {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only the booking owner can leave feedback",
            None,
        ));
    }
    if booking.status != BookingStatus::Completed {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Feedback is only accepted for completed bookings",
            Some(json!({ "status": booking.status })),
        ));
    }

    let comment = payload
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    let feedback = sqlx::query_as::<_, Feedback>(
        "INSERT INTO feedback
            (booking_id, house_owner_id, technician_id, service_id, rating,
             quality_rating, punctuality_rating, professionalism_rating, comment, source)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING *",
    )
    .bind(payload.booking_id)
    .bind(booking.house_owner_id)
    .bind(booking.technician_id)
    .bind(booking.service_id)
    .bind(payload.rating)
    .bind(payload.quality_rating)
    .bind(payload.punctuality_rating)
    .bind(payload.professionalism_rating)
    .bind(&comment)
    .bind(payload.source)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                return ApiResponse::<()>::error(
                    StatusCode::CONFLICT,
                    "Feedback for this booking already exists",
                    None,
                );
            }
        }
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save feedback",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Feedback submitted successfully",
        feedback,
    ))
}

/// Admin listing with optional filters and pagination.
#[utoipa::path(
    get,
    path = "/feedback",
    params(FeedbackFilter),
    responses(
        (status = 200, description = "Feedback entries", body = [Feedback]),
        (status = 403, description = "Admin only")
    ),
    tag = "Feedback",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_all_feedback(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Query(filter): Query<FeedbackFilter>,
) -> Result<ApiResponse<Vec<Feedback>>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can list all feedback",
            None,
        ));
    }

    let mut builder = QueryBuilder::new("SELECT * FROM feedback WHERE TRUE");
    if let Some(rating) = filter.rating {
        builder.push(" AND rating = ").push_bind(rating);
    }
    if let Some(technician_id) = filter.technician_id {
        builder.push(" AND technician_id = ").push_bind(technician_id);
    }
    if let Some(service_id) = filter.service_id {
        builder.push(" AND service_id = ").push_bind(service_id);
    }
    if filter.unanswered_only.unwrap_or(false) {
        builder.push(" AND admin_response IS NULL");
    }
    builder.push(" ORDER BY created_at DESC");
    builder
        .push(" LIMIT ")
        .push_bind(filter.limit.unwrap_or(100).clamp(1, 500));
    builder
        .push(" OFFSET ")
        .push_bind(filter.offset.unwrap_or(0).max(0));

    let entries = builder
        .build_query_as::<Feedback>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve feedback",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Feedback retrieved successfully",
        entries,
    ))
}

/// Aggregates for the admin dashboard.
#[utoipa::path(
    get,
    path = "/feedback/stats",
    responses(
        (status = 200, description = "Feedback statistics", body = FeedbackStats),
        (status = 403, description = "Admin only")
    ),
    tag = "Feedback",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_feedback_stats(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<FeedbackStats>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can view feedback statistics",
            None,
        ));
    }

    #[derive(sqlx::FromRow)]
    struct StatsRow {
        total: i64,
        average_rating: Option<f64>,
        r1: i64,
        r2: i64,
        r3: i64,
        r4: i64,
        r5: i64,
        average_quality: Option<f64>,
        average_punctuality: Option<f64>,
        average_professionalism: Option<f64>,
        awaiting_technician: i64,
    }

    let row = sqlx::query_as::<_, StatsRow>(
        "SELECT
            COUNT(*) AS total,
            AVG(rating)::float8 AS average_rating,
            COUNT(*) FILTER (WHERE rating = 1) AS r1,
            COUNT(*) FILTER (WHERE rating = 2) AS r2,
            COUNT(*) FILTER (WHERE rating = 3) AS r3,
            COUNT(*) FILTER (WHERE rating = 4) AS r4,
            COUNT(*) FILTER (WHERE rating = 5) AS r5,
            AVG(quality_rating)::float8 AS average_quality,
            AVG(punctuality_rating)::float8 AS average_punctuality,
            AVG(professionalism_rating)::float8 AS average_professionalism,
            COUNT(*) FILTER (WHERE technician_id IS NULL) AS awaiting_technician
         FROM feedback",
    )
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to compute feedback statistics",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    let stats = FeedbackStats {
        total: row.total,
        average_rating: row.average_rating,
        rating_distribution: [row.r1, row.r2, row.r3, row.r4, row.r5],
        average_quality: row.average_quality,
        average_punctuality: row.average_punctuality,
        average_professionalism: row.average_professionalism,
        awaiting_technician: row.awaiting_technician,
    };

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Feedback statistics computed successfully",
        stats,
    ))
}

/// Feedback the authenticated house owner has submitted.
#[utoipa::path(
    get,
    path = "/feedback/user",
    responses(
        (status = 200, description = "Own feedback", body = [Feedback])
    ),
    tag = "Feedback",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_my_feedback(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<Feedback>>, ApiResponse<()>> {
    let entries = sqlx::query_as::<_, Feedback>(
        "SELECT * FROM feedback WHERE house_owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(perms.user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve feedback",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Feedback retrieved successfully",
        entries,
    ))
}

/// Feedback about the authenticated technician's work.
#[utoipa::path(
    get,
    path = "/feedback/technician",
    responses(
        (status = 200, description = "Feedback about my jobs", body = [Feedback]),
        (status = 403, description = "Technicians only")
    ),
    tag = "Feedback",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_technician_feedback(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<Feedback>>, ApiResponse<()>> {
    if !perms.is_technician() && !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only technicians receive feedback",
            None,
        ));
    }

    let entries = sqlx::query_as::<_, Feedback>(
        "SELECT * FROM feedback WHERE technician_id = $1 ORDER BY created_at DESC",
    )
    .bind(perms.user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve feedback",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Feedback retrieved successfully",
        entries,
    ))
}

/// Records an admin response on a feedback entry.
#[utoipa::path(
    put,
    path = "/feedback/{id}/reply",
    params(
        ("id" = i32, Path, description = "Feedback ID")
    ),
    request_body = AdminReply,
    responses(
        (status = 200, description = "Reply recorded", body = Feedback),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Feedback not found")
    ),
    tag = "Feedback",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn reply_to_feedback(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
    Json(payload): Json<AdminReply>,
) -> Result<ApiResponse<Feedback>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can reply to feedback",
            None,
        ));
    }

    if payload.response.trim().is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Reply must not be empty",
            None,
        ));
    }

    let feedback = sqlx::query_as::<_, Feedback>(
        "UPDATE feedback SET admin_response = $1, responded_at = NOW()
         WHERE id = $2
         RETURNING *",
    )
    .bind(payload.response.trim())
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to record reply",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Feedback not found", None)
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Reply recorded successfully",
        feedback,
    ))
}

/// Attaches a technician to feedback whose booking never had one assigned
/// ("needs assignment" in the admin view).
#[utoipa::path(
    put,
    path = "/feedback/{id}/assign-technician",
    params(
        ("id" = i32, Path, description = "Feedback ID")
    ),
    request_body = crate::db::models::booking::AssignTechnician,
    responses(
        (status = 200, description = "Technician attached", body = Feedback),
        (status = 400, description = "Target is not a technician"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Feedback not found"),
        (status = 409, description = "Feedback already has a technician")
    ),
    tag = "Feedback",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn assign_feedback_technician(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
    Json(payload): Json<crate::db::models::booking::AssignTechnician>,
) -> Result<ApiResponse<Feedback>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can assign technicians to feedback",
            None,
        ));
    }

    let is_technician = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND role = 'technician')",
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
            "Target user is not a technician",
            None,
        ));
    }

    // Same NULL-guard as booking assignment; repeated calls are no-ops.
    let feedback = sqlx::query_as::<_, Feedback>(
        "UPDATE feedback SET technician_id = $1
         WHERE id = $2 AND technician_id IS NULL
         RETURNING *",
    )
    .bind(payload.technician_id)
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to attach technician",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    match feedback {
        Some(feedback) => Ok(ApiResponse::success(
            StatusCode::OK,
            "Technician attached successfully",
            feedback,
        )),
        None => {
            let existing = sqlx::query_as::<_, Feedback>("SELECT * FROM feedback WHERE id = $1")
                .bind(id)
                .fetch_optional(&pool)
                .await
                .map_err(|e| {
                    ApiResponse::<()>::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Database query failed",
                        Some(json!({ "db_error": e.to_string() })),
                    )
                })?
                .ok_or_else(|| {
                    ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Feedback not found", None)
                })?;

            if existing.technician_id == Some(payload.technician_id) {
                Ok(ApiResponse::success(
                    StatusCode::OK,
                    "Technician already attached",
                    existing,
                ))
            } else {
                Err(ApiResponse::<()>::error(
                    StatusCode::CONFLICT,
                    "Feedback already has a technician",
                    Some(json!({ "technician_id": existing.technician_id })),
                ))
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct ExportRow {
    id: i32,
    booking_id: i32,
    house_owner: String,
    technician: Option<String>,
    service: String,
    rating: i16,
    comment: Option<String>,
    admin_response: Option<String>,
    created_at: chrono::NaiveDateTime,
}

/// Downloads all feedback as CSV.
#[utoipa::path(
    get,
    path = "/feedback/export",
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv"),
        (status = 403, description = "Admin only")
    ),
    tag = "Feedback",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn export_feedback(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<Response, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can export feedback",
            None,
        ));
    }

    let rows = sqlx::query_as::<_, ExportRow>(
        "SELECT f.id, f.booking_id,
                ho.full_name AS house_owner,
                t.full_name AS technician,
                s.name AS service,
                f.rating, f.comment, f.admin_response, f.created_at
         FROM feedback f
         JOIN users ho ON ho.id = f.house_owner_id
         LEFT JOIN users t ON t.id = f.technician_id
         JOIN services s ON s.id = f.service_id
         ORDER BY f.created_at",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to export feedback",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    let header = [
        "id",
        "booking_id",
        "house_owner",
        "technician",
        "service",
        "rating",
        "comment",
        "admin_response",
        "created_at",
    ];
    let records: Vec<Vec<String>> = rows
        .into_iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.booking_id.to_string(),
                r.house_owner,
                r.technician.unwrap_or_default(),
                r.service,
                r.rating.to_string(),
                r.comment.unwrap_or_default(),
                r.admin_response.unwrap_or_default(),
                r.created_at.to_string(),
            ]
        })
        .collect();

    let csv = export::to_csv(&header, &records);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"feedback_export.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_feedback,
        get_all_feedback,
        get_feedback_stats,
        get_my_feedback,
        get_technician_feedback,
        reply_to_feedback,
        assign_feedback_technician,
        export_feedback,
    ),
    components(
        schemas(Feedback, NewFeedback, AdminReply, FeedbackStats)
    ),
    tags(
        (name = "Feedback", description = "Ratings and feedback management")
    )
)]
pub struct FeedbackDoc;
