use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Service {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    #[schema(value_type = String)]
    pub base_price: BigDecimal,
    pub duration_minutes: i32,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    #[schema(value_type = String)]
    pub base_price: BigDecimal,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateService {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[schema(value_type = String)]
    pub base_price: Option<BigDecimal>,
    pub duration_minutes: Option<i32>,
    pub active: Option<bool>,
}
