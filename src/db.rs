use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    models::{BookingRow, Role},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_admin(pool).await?;
    seed_services(pool).await?;
    seed_demo_accounts(pool).await?;
    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    booking_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, booking_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(booking_id)
    .execute(pool)
    .await;
}

pub async fn fetch_booking(pool: &SqlitePool, booking_id: &str) -> Option<BookingRow> {
    sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = ? LIMIT 1")
        .bind(booking_id)
        .fetch_optional(pool)
        .await
        .unwrap_or(None)
}

async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(Role::Admin.as_str())
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@techcare.rw".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    let full_name = env::var("ADMIN_FULL_NAME").unwrap_or_else(|_| "Platform Admin".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash =
        hash_password(&password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    insert_user(pool, &email, &full_name, "", Role::Admin, &password_hash).await?;
    Ok(())
}

async fn seed_services(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let catalog = vec![
        (
            "Computer Support",
            "Complete computer setup, repair, and optimization services",
            8000,
            120,
        ),
        (
            "Mobile Device Help",
            "Smartphone and tablet repair, setup, and optimization",
            5000,
            60,
        ),
        (
            "Network & WiFi",
            "Internet setup, WiFi optimization, and network security",
            10000,
            120,
        ),
        (
            "Software Solutions",
            "Software installation, updates, and troubleshooting",
            6000,
            60,
        ),
        (
            "Security & Backup",
            "Data protection, security setup, and backup solutions",
            12000,
            120,
        ),
        (
            "Maintenance & Repair",
            "Regular maintenance and hardware repair services",
            15000,
            180,
        ),
    ];

    for (name, description, base_price_rwf, duration_minutes) in catalog {
        let exists =
            sqlx::query_as::<_, (i64,)>("SELECT id FROM services WHERE service_name = ? LIMIT 1")
                .bind(name)
                .fetch_optional(pool)
                .await?;
        if exists.is_some() {
            continue;
        }
        sqlx::query(
            r#"INSERT INTO services (service_name, description, base_price_rwf, duration_minutes, active)
               VALUES (?, ?, ?, ?, 1)"#,
        )
        .bind(name)
        .bind(description)
        .bind(base_price_rwf)
        .bind(duration_minutes)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_demo_accounts(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let demo_seed = env::var("SEED_DEMO").unwrap_or_else(|_| "false".to_string());
    if demo_seed != "true" {
        return Ok(());
    }

    let technician_exists =
        sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
            .bind(Role::Technician.as_str())
            .fetch_optional(pool)
            .await?;
    if technician_exists.is_none() {
        let password = env::var("TECHNICIAN_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
        if password == "change-me" {
            log::warn!("TECHNICIAN_PASSWORD not set. Using default password 'change-me'.");
        }
        let password_hash = hash_password(&password)
            .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
        let technician_id = insert_user(
            pool,
            "technician@techcare.rw",
            "Jean Baptiste",
            "+250 788 000 001",
            Role::Technician,
            &password_hash,
        )
        .await?;

        sqlx::query(
            r#"INSERT INTO technician_details (user_id, specialization, hourly_rate_rwf, is_available, updated_at)
               VALUES (?, ?, ?, 1, ?)"#,
        )
        .bind(&technician_id)
        .bind("Computer repair and networking")
        .bind(5000)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    }

    let customer_exists =
        sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
            .bind(Role::Customer.as_str())
            .fetch_optional(pool)
            .await?;
    if customer_exists.is_none() {
        let password = env::var("CUSTOMER_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
        let password_hash = hash_password(&password)
            .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
        insert_user(
            pool,
            "customer@techcare.rw",
            "Alice Uwase",
            "+250 788 000 002",
            Role::Customer,
            &password_hash,
        )
        .await?;
    }

    Ok(())
}

async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    full_name: &str,
    phone_number: &str,
    role: Role,
    password_hash: &str,
) -> Result<String, sqlx::Error> {
    let id = new_id();
    sqlx::query(
        r#"INSERT INTO users (id, email, full_name, phone_number, role, password_hash, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&id)
    .bind(email)
    .bind(full_name)
    .bind(phone_number)
    .bind(role.as_str())
    .bind(password_hash)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(id)
}
