use actix_web::{middleware::from_fn, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{basic_validator, logout_guard, AuthUser},
    db::log_activity,
    error::ApiError,
    models::{Role, TechnicianDetailRow},
    state::AppState,
    workflow,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AvailabilityForm {
    is_available: bool,
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
struct TechnicianSummary {
    user_id: String,
    full_name: String,
    phone_number: String,
    specialization: String,
    hourly_rate_rwf: i64,
    is_available: bool,
    updated_at: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/technicians").route(web::get().to(list_technicians)))
        .service(
            web::scope("/api/technicians")
                .wrap(HttpAuthentication::basic(basic_validator))
                .wrap(from_fn(logout_guard))
                .service(
                    web::resource("/{id}/availability").route(web::put().to(update_availability)),
                ),
        );
}

async fn list_technicians(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let technicians = sqlx::query_as::<_, TechnicianSummary>(
        r#"SELECT t.user_id, u.full_name, u.phone_number, t.specialization,
                  t.hourly_rate_rwf, t.is_available, t.updated_at
           FROM technician_details t
           JOIN users u ON u.id = t.user_id
           WHERE u.active = 1 AND u.role = ?
           ORDER BY u.full_name"#,
    )
    .bind(Role::Technician.as_str())
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "technicians": technicians })))
}

async fn update_availability(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Json<AvailabilityForm>,
) -> Result<HttpResponse, ApiError> {
    let technician_id = path.into_inner();
    if technician_id.trim().is_empty() {
        return Err(ApiError::Validation(
            "Technician ID is required".to_string(),
        ));
    }

    workflow::authorize_availability(&technician_id, &auth.id)?;

    // updated_at refreshes even when the flag already holds the desired
    // value; repeat toggles must still be observable.
    let result = sqlx::query(
        "UPDATE technician_details SET is_available = ?, updated_at = ? WHERE user_id = ?",
    )
    .bind(form.is_available)
    .bind(Utc::now().to_rfc3339())
    .bind(&technician_id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!(
            "Technician with user ID {technician_id} not found"
        )));
    }

    let technician = sqlx::query_as::<_, TechnicianDetailRow>(
        "SELECT * FROM technician_details WHERE user_id = ? LIMIT 1",
    )
    .bind(&technician_id)
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        "availability_update",
        &format!(
            "{} set availability to {}.",
            auth.full_name, technician.is_available
        ),
        Some(&auth.id),
        None,
    )
    .await;

    let message = if technician.is_available {
        "Availability enabled"
    } else {
        "Availability disabled"
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "technician": technician,
        "message": message
    })))
}
