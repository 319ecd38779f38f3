//! Seeds a fresh database with demo accounts and a small catalog so the API
//! is usable straight after `cargo run --bin seed`.

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use std::str::FromStr;
use tracing::info;

use homeserve_backend::config::Config;
use homeserve_backend::db::models::user::UserRole;
use homeserve_backend::db::pool::get_db_pool;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    Config::init();
    let pool = get_db_pool().await;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    seed_users(&pool).await?;
    seed_services(&pool).await?;
    seed_inventory(&pool).await?;
    seed_announcement(&pool).await?;

    info!("Seeding complete.");
    Ok(())
}

async fn seed_users(pool: &PgPool) -> Result<()> {
    let demo_users = [
        ("admin", "admin@homeserve.local", "admin123", "Site Admin", UserRole::Admin),
        ("owner_demo", "owner@homeserve.local", "owner123", "Dana Whitfield", UserRole::HouseOwner),
        ("tech_plumber", "plumber@homeserve.local", "tech123", "Marco Ellis", UserRole::Technician),
        ("tech_electric", "electric@homeserve.local", "tech123", "Priya Nair", UserRole::Technician),
    ];

    for (username, email, password, full_name, role) in demo_users {
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .context("Failed to hash seed password")?;
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, full_name, role)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(username)
        .bind(email)
        .bind(hash)
        .bind(full_name)
        .bind(role)
        .execute(pool)
        .await?;
        info!("seeded user {username} ({})", role.as_str());
    }
    Ok(())
}

async fn seed_services(pool: &PgPool) -> Result<()> {
    let services = [
        ("Pipe Repair", "Plumbing", "85.00", 90),
        ("Drain Cleaning", "Plumbing", "60.00", 60),
        ("Outlet Installation", "Electrical", "70.00", 45),
        ("Ceiling Fan Installation", "Electrical", "110.00", 120),
        ("AC Service", "HVAC", "95.00", 90),
    ];

    for (name, category, price, minutes) in services {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM services WHERE name = $1)",
        )
        .bind(name)
        .fetch_one(pool)
        .await?;
        if exists {
            continue;
        }
        sqlx::query(
            "INSERT INTO services (name, category, base_price, duration_minutes)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(name)
        .bind(category)
        .bind(BigDecimal::from_str(price)?)
        .bind(minutes)
        .execute(pool)
        .await?;
        info!("seeded service {name}");
    }
    Ok(())
}

async fn seed_inventory(pool: &PgPool) -> Result<()> {
    let items = [
        ("Copper Pipe 15mm (1m)", "Plumbing", "12.50", "8.00", 40, 10),
        ("PVC Elbow Joint", "Plumbing", "2.25", "1.10", 120, 30),
        ("Wall Outlet (grounded)", "Electrical", "7.25", "4.00", 80, 20),
        ("Circuit Breaker 16A", "Electrical", "18.00", "11.50", 25, 10),
        ("AC Filter", "HVAC", "22.00", "14.00", 15, 12),
    ];

    for (name, category, price, cost, quantity, reorder) in items {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM inventory_items WHERE name = $1)",
        )
        .bind(name)
        .fetch_one(pool)
        .await?;
        if exists {
            continue;
        }
        sqlx::query(
            "INSERT INTO inventory_items (name, category, price, cost, quantity, reorder_level)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(name)
        .bind(category)
        .bind(BigDecimal::from_str(price)?)
        .bind(BigDecimal::from_str(cost)?)
        .bind(quantity)
        .bind(reorder)
        .execute(pool)
        .await?;
        info!("seeded inventory item {name}");
    }
    Ok(())
}

async fn seed_announcement(pool: &PgPool) -> Result<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM announcements WHERE title = 'Welcome to HomeServe')",
    )
    .fetch_one(pool)
    .await?;
    if exists {
        return Ok(());
    }

    let admin_id = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE username = 'admin'")
        .fetch_one(pool)
        .await
        .context("Admin user must be seeded before announcements")?;

    sqlx::query(
        "INSERT INTO announcements (title, body, created_by)
         VALUES ('Welcome to HomeServe', 'Book a technician for plumbing, electrical and HVAC work.', $1)",
    )
    .bind(admin_id)
    .execute(pool)
    .await?;
    info!("seeded welcome announcement");
    Ok(())
}
