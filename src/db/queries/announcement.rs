use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};

use crate::db::models::announcement::{
    Announcement, AnnouncementView, Audience, NewAnnouncement, UpdateAnnouncement,
};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;

/// Active announcements whose audience covers the caller's role, each
/// carrying the derived window flags.
#[utoipa::path(
    get,
    path = "/announcements",
    responses(
        (status = 200, description = "Active announcements", body = [AnnouncementView]),
        (status = 500, description = "Failed to retrieve announcements")
    ),
    tag = "Announcements",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_announcements(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<AnnouncementView>>, ApiResponse<()>> {
    let announcements = sqlx::query_as::<_, Announcement>(
        "SELECT * FROM announcements
         WHERE start_date <= NOW() AND (end_date IS NULL OR end_date > NOW())
         ORDER BY start_date DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve announcements",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    let now = Utc::now().naive_utc();
    let views = announcements
        .into_iter()
        .filter(|a| a.audience.covers(perms.role))
        .map(|a| AnnouncementView::at(a, now))
        .collect();

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Announcements retrieved successfully",
        views,
    ))
}

/// Admin listing: everything, active or not.
#[utoipa::path(
    get,
    path = "/announcements/admin",
    responses(
        (status = 200, description = "All announcements", body = [AnnouncementView]),
        (status = 403, description = "Admin only")
    ),
    tag = "Announcements",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_all_announcements(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<AnnouncementView>>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can list all announcements",
            None,
        ));
    }

    let announcements = sqlx::query_as::<_, Announcement>(
        "SELECT * FROM announcements ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve announcements",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    let now = Utc::now().naive_utc();
    let views = announcements
        .into_iter()
        .map(|a| AnnouncementView::at(a, now))
        .collect();

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Announcements retrieved successfully",
        views,
    ))
}

#[utoipa::path(
    post,
    path = "/announcements",
    request_body = NewAnnouncement,
    responses(
        (status = 201, description = "Announcement created", body = Announcement),
        (status = 400, description = "End date before start date"),
        (status = 403, description = "Admin only")
    ),
    tag = "Announcements",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_announcement(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Json(payload): Json<NewAnnouncement>,
) -> Result<ApiResponse<Announcement>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can create announcements",
            None,
        ));
    }

    let start_date = payload.start_date.unwrap_or_else(|| Utc::now().naive_utc());
    if let Some(end) = payload.end_date {
        if end <= start_date {
            return Err(ApiResponse::<()>::error(
                StatusCode::BAD_REQUEST,
                "End date must be after the start date",
                None,
            ));
        }
    }

    let announcement = sqlx::query_as::<_, Announcement>(
        "INSERT INTO announcements (title, body, audience, start_date, end_date, created_by)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(&payload.title)
    .bind(&payload.body)
    .bind(payload.audience.unwrap_or(Audience::All))
    .bind(start_date)
    .bind(payload.end_date)
    .bind(perms.user_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create announcement",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Announcement created successfully",
        announcement,
    ))
}

/// Partial update; passing `"end_date": null` explicitly clears the window.
#[utoipa::path(
    put,
    path = "/announcements/{id}",
    params(
        ("id" = i32, Path, description = "Announcement ID")
    ),
    request_body = UpdateAnnouncement,
    responses(
        (status = 200, description = "Announcement updated", body = Announcement),
        (status = 400, description = "Nothing to update"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Announcement not found")
    ),
    tag = "Announcements",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_announcement(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateAnnouncement>,
) -> Result<ApiResponse<Announcement>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can update announcements",
            None,
        ));
    }

    let mut builder = QueryBuilder::new("UPDATE announcements SET updated_at = NOW()");
    if let Some(title) = &payload.title {
        builder.push(", title = ").push_bind(title);
    }
    if let Some(body) = &payload.body {
        builder.push(", body = ").push_bind(body);
    }
    if let Some(audience) = payload.audience {
        builder.push(", audience = ").push_bind(audience);
    }
    if let Some(start_date) = payload.start_date {
        builder.push(", start_date = ").push_bind(start_date);
    }
    if let Some(end_date) = payload.end_date {
        builder.push(", end_date = ").push_bind(end_date);
    }
    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING *");

    let announcement = builder
        .build_query_as::<Announcement>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update announcement",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Announcement not found", None)
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Announcement updated successfully",
        announcement,
    ))
}

#[utoipa::path(
    delete,
    path = "/announcements/{id}",
    params(
        ("id" = i32, Path, description = "Announcement ID")
    ),
    responses(
        (status = 200, description = "Announcement deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Announcement not found")
    ),
    tag = "Announcements",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_announcement(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can delete announcements",
            None,
        ));
    }

    let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete announcement",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Announcement not found",
            None,
        ));
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Announcement deleted successfully",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_announcements,
        get_all_announcements,
        create_announcement,
        update_announcement,
        delete_announcement,
    ),
    components(
        schemas(Announcement, AnnouncementView, NewAnnouncement, UpdateAnnouncement, Audience)
    ),
    tags(
        (name = "Announcements", description = "Time-windowed broadcast messages")
    )
)]
pub struct AnnouncementDoc;
