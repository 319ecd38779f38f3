use axum::{
    body::Body,
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::db::models::user::UserRole;
use crate::utils::api_response::ApiResponse;

/// ✅ Role/permission cache using `moka`, keyed by user id.
pub type PermissionCache = Arc<Cache<i32, UserPermissions>>;

pub fn create_permission_cache() -> PermissionCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // TTL = 10 minutes
            .build(),
    )
}

/// ✅ JWT Middleware (Handles Token Authentication)
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    // Step 1: Extract Authorization header
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        tracing::error!("Missing Authorization header");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    // Step 2: Convert header to string
    let token_str = auth_header.to_str().map_err(|_| {
        tracing::error!("Invalid Authorization header format");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid Authorization header format",
            None,
        )
        .into_response()
    })?;

    // Step 3: Strip "Bearer " prefix
    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::error!("Invalid token format (missing 'Bearer ' prefix)");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    // Step 4: Decode the JWT token
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::error!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    // Step 5: Insert claims into request extensions and continue
    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Per-request authorization context resolved from the database (and cached).
/// The role here is authoritative — a stale token cannot outlive a role change
/// or an account lock for longer than the cache TTL.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserPermissions {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    pub account_locked: bool,
}

impl UserPermissions {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_technician(&self) -> bool {
        self.role == UserRole::Technician
    }

    pub fn is_house_owner(&self) -> bool {
        self.role == UserRole::HouseOwner
    }

    /// Accept/reject decisions on pending bookings are an admin call.
    pub fn can_review_bookings(&self) -> bool {
        self.is_admin()
    }

    /// Start/complete is for the assigned technician; admins may step in.
    pub fn can_work_booking(&self, technician_id: Option<i32>) -> bool {
        self.is_admin() || technician_id == Some(self.user_id)
    }

    /// Cancelling is for the owning house owner; admins may step in.
    pub fn can_cancel_booking(&self, house_owner_id: i32) -> bool {
        self.is_admin() || house_owner_id == self.user_id
    }

    /// Owner, assigned technician and admin may read a booking.
    pub fn can_view_booking(&self, house_owner_id: i32, technician_id: Option<i32>) -> bool {
        self.is_admin() || house_owner_id == self.user_id || technician_id == Some(self.user_id)
    }

    /// Catalog, inventory and announcement mutations are admin-only.
    pub fn can_manage_catalog(&self) -> bool {
        self.is_admin()
    }
}

/// ✅ Permission middleware: resolves `UserPermissions` for the authenticated
/// user, consulting the moka cache before the database.
pub async fn rbac_middleware(
    State(db_pool): State<PgPool>,
    Extension(permission_cache): Extension<PermissionCache>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing JWT claims in request", None)
            .into_response()
    })?;

    let user_id: i32 = claims.sub.parse().map_err(|_| {
        error!("Invalid user ID format in JWT claims");
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid user ID format in JWT claims",
            None,
        )
        .into_response()
    })?;

    // ✅ Check cache first before querying DB
    if let Some(cached) = permission_cache.get(&user_id) {
        return continue_with(cached, req, next).await;
    }

    let permissions = match fetch_permissions_from_db(user_id, &db_pool).await {
        Ok(Some(permissions)) => permissions,
        Ok(None) => {
            return Err(ApiResponse::<()>::error(
                StatusCode::UNAUTHORIZED,
                "User no longer exists",
                None,
            )
            .into_response());
        }
        Err(err) => {
            error!("Database query failed: {:?}", err);
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user permissions",
                Some(json!({ "error": err.to_string() })),
            )
            .into_response());
        }
    };

    permission_cache.insert(user_id, permissions.clone());
    continue_with(permissions, req, next).await
}

async fn continue_with(
    permissions: UserPermissions,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    if permissions.account_locked {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Account is locked. Contact your administrator.",
            None,
        )
        .into_response());
    }
    req.extensions_mut().insert(permissions);
    Ok(next.run(req).await)
}

async fn fetch_permissions_from_db(
    user_id: i32,
    pool: &PgPool,
) -> Result<Option<UserPermissions>, sqlx::Error> {
    #[derive(sqlx::FromRow)]
    struct PermRow {
        username: String,
        role: UserRole,
        account_locked: bool,
    }

    let row = sqlx::query_as::<_, PermRow>(
        "SELECT username, role, account_locked FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| UserPermissions {
        user_id,
        username: r.username,
        role: r.role,
        account_locked: r.account_locked,
    }))
}
