use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    HouseOwner,
    Technician,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::HouseOwner => "house_owner",
            UserRole::Technician => "technician",
            UserRole::Admin => "admin",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub account_locked: bool,
    pub created_at: NaiveDateTime,
}

/// Public view of a user, safe to embed in booking/feedback responses.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfile {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserAddress {
    pub id: i32,
    pub user_id: i32,
    pub label: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: String,
    pub is_default: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewAddress {
    pub label: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: String,
    #[serde(default)]
    pub is_default: bool,
}
