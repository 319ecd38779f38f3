use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::config::Config;
use crate::db::models::user::UserRole;
use crate::utils::api_response::ApiResponse;

/// Represents a request to register a new user.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    /// Requested role; only house_owner and technician can self-register.
    pub role: Option<UserRole>,
}

/// Represents a successful user registration response.
#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
}

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// The username of the authenticated user.
    pub username: String,
    /// The role assigned to the user.
    pub role: UserRole,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

impl Claims {
    /// Converts `sub` (user ID) to `i32`, or returns a descriptive error.
    pub fn user_id(&self) -> Result<i32, ApiResponse<()>> {
        self.sub.parse::<i32>().map_err(|_| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                "Invalid user ID format in token",
                None,
            )
        })
    }
}

/// Represents a request to log in.
#[derive(Serialize, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Represents a successful login response returning a JWT token.
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub role: UserRole,
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    id: i32,
    username: String,
    password_hash: String,
    role: UserRole,
    account_locked: bool,
}

/// Handles user login.
///
/// # Returns
/// * `200 OK` - Returns a JWT token if authentication is successful.
/// * `401 Unauthorized` - If credentials are incorrect.
/// * `403 Forbidden` - If the account is locked.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body(
        content = LoginRequest,
        description = "User login details",
    ),
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 403, description = "Account locked"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiResponse<()>> {
    let config = Config::get();

    let user = sqlx::query_as::<_, LoginRow>(
        "SELECT id, username, password_hash, role, account_locked FROM users WHERE username = $1",
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database error",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    if let Some(user) = user {
        if user.account_locked {
            warn!("🔒 Login attempt for locked account: {}", payload.username);
            return Err(ApiResponse::<()>::error(
                StatusCode::FORBIDDEN,
                "Account is locked. Contact your administrator.",
                None,
            ));
        }

        match verify(&payload.password, &user.password_hash) {
            Ok(true) => {
                let claims = Claims {
                    sub: user.id.to_string(),
                    username: user.username.clone(),
                    role: user.role,
                    exp: (chrono::Utc::now().timestamp()
                        + config.token_ttl_hours * 3600) as usize,
                };
                let token = encode(
                    &Header::default(),
                    &claims,
                    &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
                )
                .map_err(|e| {
                    ApiResponse::<()>::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Token generation failed",
                        Some(json!({ "error": e.to_string() })),
                    )
                })?;

                info!("✅ Login successful for user: {}", payload.username);
                return Ok(Json(LoginResponse {
                    token,
                    role: user.role,
                }));
            }
            Ok(false) => {
                warn!("❌ Invalid password attempt for user: {}", payload.username);
                return Err(ApiResponse::<()>::error(
                    StatusCode::UNAUTHORIZED,
                    "Invalid username or password.",
                    None,
                ));
            }
            Err(e) => {
                error!("❌ Password verification error: {}", e);
                return Err(ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Password verification error",
                    Some(json!({ "error": e.to_string() })),
                ));
            }
        }
    }

    warn!("❌ Login attempt for non-existent user: {}", payload.username);
    Err(ApiResponse::<()>::error(
        StatusCode::UNAUTHORIZED,
        "Invalid username or password.",
        None,
    ))
}

/// Handles user registration.
///
/// Self-registration is limited to the house_owner and technician roles;
/// admin accounts come from the seed tool or another admin.
///
/// # Returns
/// * `201 Created` - If registration is successful.
/// * `409 Conflict` - If the username or email is already taken.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "Successful Register", body = RegisterResponse),
        (status = 400, description = "Admin self-registration refused"),
        (status = 409, description = "Username or email already taken"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, ApiResponse<()>> {
    let role = payload.role.unwrap_or(UserRole::HouseOwner);
    if role == UserRole::Admin {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Admin accounts cannot self-register",
            None,
        ));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let result = sqlx::query(
        "INSERT INTO users (username, email, password_hash, full_name, phone, role)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&password_hash)
    .bind(&payload.full_name)
    .bind(&payload.phone)
    .bind(role)
    .execute(&pool)
    .await;

    match result {
        Ok(_) => Ok(ApiResponse::success(
            StatusCode::CREATED,
            "User registered",
            RegisterResponse {
                message: "User registered".into(),
            },
        )),
        Err(e) => {
            if let Some(db_err) = e.as_database_error() {
                // unique_violation
                if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                    return Err(ApiResponse::<()>::error(
                        StatusCode::CONFLICT,
                        "Username or email already taken",
                        None,
                    ));
                }
            }
            Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Represents a request to change a user's password.
#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Handles a password change for the authenticated user.
///
/// The caller must provide their current password for verification.
#[utoipa::path(
    post,
    path = "/auth/change_password",
    tag = "Authentication",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated successfully"),
        (status = 401, description = "Old password incorrect"),
        (status = 500, description = "Internal Server Error")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn change_password(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let current_hash = sqlx::query_scalar::<_, String>(
        "SELECT password_hash FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None))?;

    let is_valid = verify(&payload.old_password, &current_hash).unwrap_or(false);
    if !is_valid {
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Incorrect old password",
            None,
        ));
    }

    let new_password_hash = hash(&payload.new_password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(&new_password_hash)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update password",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Password updated successfully",
        (),
    ))
}

/// Public authentication routes: register and login.
pub fn auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Protected authentication routes, mounted behind the JWT middleware.
pub fn secure_auth_routes() -> Router<PgPool> {
    Router::new().route("/auth/change_password", post(change_password))
}

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use utoipa::OpenApi;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(login, register, change_password),
    components(
        schemas(
            LoginRequest, LoginResponse,
            RegisterRequest, RegisterResponse,
            ChangePasswordRequest
        )
    ),
    tags(
        (name = "Authentication", description = "User Auth Endpoints")
    ),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;
