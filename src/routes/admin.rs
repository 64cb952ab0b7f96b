use actix_web::{middleware::from_fn, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{admin_validator, logout_guard},
    error::ApiError,
    models::{ActivityRow, BookingRow, BookingStatus, Role, UserRow},
    state::AppState,
};

#[derive(Deserialize)]
struct BookingFilter {
    status: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("/stats").route(web::get().to(stats)))
            .service(web::resource("/bookings").route(web::get().to(list_bookings)))
            .service(web::resource("/users").route(web::get().to(list_users)))
            .service(web::resource("/activities").route(web::get().to(list_activities))),
    );
}

async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let mut bookings = serde_json::Map::new();
    bookings.insert(
        "total".to_string(),
        json!(count(&state, "SELECT COUNT(*) FROM bookings", None).await?),
    );
    for status in BookingStatus::ALL {
        let value = count(
            &state,
            "SELECT COUNT(*) FROM bookings WHERE status = ?",
            Some(status.as_str()),
        )
        .await?;
        bookings.insert(status.as_str().to_string(), json!(value));
    }

    let mut users = serde_json::Map::new();
    for role in Role::ALL {
        let value = count(
            &state,
            "SELECT COUNT(*) FROM users WHERE role = ? AND active = 1",
            Some(role.as_str()),
        )
        .await?;
        users.insert(role.as_str().to_string(), json!(value));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "bookings": bookings,
        "users": users
    })))
}

async fn list_bookings(
    state: web::Data<AppState>,
    filter: web::Query<BookingFilter>,
) -> Result<HttpResponse, ApiError> {
    let bookings = match filter.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => {
            let status = BookingStatus::parse(raw).ok_or_else(|| {
                ApiError::Validation(format!("Invalid status filter '{raw}'"))
            })?;
            sqlx::query_as::<_, BookingRow>(
                "SELECT * FROM bookings WHERE status = ? ORDER BY created_at DESC",
            )
            .bind(status.as_str())
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": bookings.len(),
        "bookings": bookings
    })))
}

async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "users": users })))
}

async fn list_activities(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let activities = sqlx::query_as::<_, ActivityRow>(
        "SELECT kind, message, created_at FROM activities ORDER BY created_at DESC LIMIT 50",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "activities": activities })))
}

async fn count(
    state: &web::Data<AppState>,
    query: &str,
    param: Option<&str>,
) -> Result<i64, ApiError> {
    let mut q = sqlx::query_scalar::<_, i64>(query);
    if let Some(param) = param {
        q = q.bind(param);
    }
    Ok(q.fetch_one(&state.db).await?)
}
