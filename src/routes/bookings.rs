use actix_web::{middleware::from_fn, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{basic_validator, logout_guard, new_id, AuthUser},
    db::{fetch_booking, log_activity},
    error::ApiError,
    models::{BookingRow, BookingStatus, Role},
    state::{AppState, ServerEvent},
    workflow::{self, TransitionRequest},
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateBookingForm {
    customer_id: Option<String>,
    technician_id: Option<String>,
    service_id: Option<i64>,
    service_type: Option<String>,
    problem_description: Option<String>,
    customer_location: Option<String>,
    price_rwf: Option<String>,
    duration: Option<i64>,
    scheduled_date: Option<String>,
    customer_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StatusUpdateForm {
    status: Option<String>,
    notes: Option<String>,
    expected_status: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/bookings")
            .route(web::get().to(api_info))
            .route(
                web::post()
                    .to(create_booking)
                    .wrap(HttpAuthentication::basic(basic_validator)),
            ),
    )
    .service(
        web::scope("/api/bookings")
            .wrap(HttpAuthentication::basic(basic_validator))
            .wrap(from_fn(logout_guard))
            .service(
                web::resource("/customer/{customer_id}").route(web::get().to(list_by_customer)),
            )
            .service(
                web::resource("/technician/{technician_id}")
                    .route(web::get().to(list_by_technician)),
            )
            .service(web::resource("/{id}/status").route(web::put().to(update_status)))
            .service(web::resource("/{id}").route(web::get().to(get_booking))),
    );
}

async fn api_info() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Booking API is working",
        "endpoints": {
            "POST /api/bookings": "Create a new booking",
            "GET /api/bookings/{id}": "Fetch a booking by id",
            "PUT /api/bookings/{id}/status": "Update booking status",
            "GET /api/bookings/customer/{customerId}": "List a customer's bookings",
            "GET /api/bookings/technician/{technicianId}": "List a technician's bookings"
        }
    }))
}

async fn create_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Json<CreateBookingForm>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();

    let mut missing = Vec::new();
    let required = [
        ("customer_id", form.customer_id.as_deref()),
        ("technician_id", form.technician_id.as_deref()),
        ("service_type", form.service_type.as_deref()),
        ("problem_description", form.problem_description.as_deref()),
        ("customer_location", form.customer_location.as_deref()),
        ("price_rwf", form.price_rwf.as_deref()),
    ];
    for (name, value) in required {
        if value.map_or(true, |v| v.trim().is_empty()) {
            missing.push(name);
        }
    }
    if form.service_id.is_none() {
        missing.push("service_id");
    }
    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let customer_id = form.customer_id.unwrap_or_default();
    if auth.role == Some(Role::Customer) && customer_id != auth.id {
        return Err(ApiError::Forbidden(
            "Customers may only create bookings for themselves".to_string(),
        ));
    }

    let booking_id = new_id();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO bookings
           (id, customer_id, technician_id, service_id, service_type, problem_description,
            customer_location, price_rwf, duration_minutes, scheduled_date, customer_notes,
            status, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&booking_id)
    .bind(&customer_id)
    .bind(form.technician_id)
    .bind(form.service_id)
    .bind(form.service_type)
    .bind(form.problem_description)
    .bind(form.customer_location)
    .bind(form.price_rwf)
    .bind(form.duration.unwrap_or(60))
    .bind(form.scheduled_date)
    .bind(form.customer_notes)
    .bind(BookingStatus::Pending.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    log_activity(
        &state.db,
        "booking_created",
        &format!("New booking requested by {}.", auth.full_name),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let booking = fetch_booking(&state.db, &booking_id)
        .await
        .ok_or_else(|| ApiError::not_found("Booking", &booking_id))?;

    let _ = state
        .events
        .send(ServerEvent::from_row("booking_created", booking.clone()));

    Ok(HttpResponse::Ok().json(json!({ "success": true, "booking": booking })))
}

async fn get_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    let booking = fetch_booking(&state.db, &booking_id)
        .await
        .ok_or_else(|| ApiError::not_found("Booking", &booking_id))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "booking": booking })))
}

async fn update_status(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Json<StatusUpdateForm>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    let form = form.into_inner();
    let status = form
        .status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Status is required".to_string()))?;

    // Fetch-then-update is deliberately sequenced; the expected_status token
    // covers the window between the two.
    let booking = fetch_booking(&state.db, &booking_id)
        .await
        .ok_or_else(|| ApiError::not_found("Booking", &booking_id))?;

    let next = workflow::transition(
        &booking,
        &TransitionRequest {
            requested_status: &status,
            notes: form.notes.as_deref(),
            expected_status: form.expected_status.as_deref(),
            actor_id: &auth.id,
        },
        Utc::now(),
    )?;

    sqlx::query(
        r#"UPDATE bookings
           SET status = ?, technician_notes = ?, updated_at = ?,
               confirmed_at = ?, scheduled_at = ?, completed_at = ?, cancelled_at = ?
           WHERE id = ?"#,
    )
    .bind(next.status.as_str())
    .bind(&next.technician_notes)
    .bind(&next.updated_at)
    .bind(&next.confirmed_at)
    .bind(&next.scheduled_at)
    .bind(&next.completed_at)
    .bind(&next.cancelled_at)
    .bind(&booking_id)
    .execute(&state.db)
    .await?;

    log_activity(
        &state.db,
        "booking_status_update",
        &format!(
            "{} updated booking {} to {}.",
            auth.full_name, booking_id, next.status
        ),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let booking = fetch_booking(&state.db, &booking_id)
        .await
        .ok_or_else(|| ApiError::not_found("Booking", &booking_id))?;

    let _ = state
        .events
        .send(ServerEvent::from_row("booking_updated", booking.clone()));

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "booking": booking,
        "message": format!("Booking status updated to {}", next.status)
    })))
}

async fn list_by_customer(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let customer_id = path.into_inner();
    if customer_id.trim().is_empty() {
        return Err(ApiError::Validation("Customer ID is required".to_string()));
    }

    let bookings = sqlx::query_as::<_, BookingRow>(
        "SELECT * FROM bookings WHERE customer_id = ? ORDER BY created_at DESC",
    )
    .bind(&customer_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "bookings": bookings })))
}

#[derive(Debug, sqlx::FromRow)]
struct TechnicianBookingRow {
    id: String,
    customer_id: String,
    technician_id: Option<String>,
    service_id: i64,
    service_type: String,
    problem_description: String,
    customer_location: String,
    price_rwf: String,
    duration_minutes: i64,
    scheduled_date: Option<String>,
    customer_notes: Option<String>,
    technician_notes: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
    confirmed_at: Option<String>,
    scheduled_at: Option<String>,
    completed_at: Option<String>,
    cancelled_at: Option<String>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    customer_email: Option<String>,
}

async fn list_by_technician(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let technician_id = path.into_inner();
    if technician_id.trim().is_empty() {
        return Err(ApiError::Validation(
            "Technician ID is required".to_string(),
        ));
    }

    let rows = sqlx::query_as::<_, TechnicianBookingRow>(
        r#"SELECT b.id, b.customer_id, b.technician_id, b.service_id, b.service_type,
                  b.problem_description, b.customer_location, b.price_rwf, b.duration_minutes,
                  b.scheduled_date, b.customer_notes, b.technician_notes, b.status,
                  b.created_at, b.updated_at, b.confirmed_at, b.scheduled_at,
                  b.completed_at, b.cancelled_at,
                  u.full_name AS customer_name, u.phone_number AS customer_phone,
                  u.email AS customer_email
           FROM bookings b
           LEFT JOIN users u ON u.id = b.customer_id
           WHERE b.technician_id = ?
           ORDER BY b.created_at DESC"#,
    )
    .bind(&technician_id)
    .fetch_all(&state.db)
    .await?;

    let bookings: Vec<serde_json::Value> = rows.into_iter().map(to_technician_booking).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": bookings.len(),
        "bookings": bookings
    })))
}

// Customer details are best-effort: the join can miss when the account was
// deactivated or removed, so unmatched bookings carry placeholder contact
// details instead of being dropped.
fn to_technician_booking(row: TechnicianBookingRow) -> serde_json::Value {
    json!({
        "id": row.id,
        "customer_id": row.customer_id,
        "technician_id": row.technician_id,
        "service_id": row.service_id,
        "service_type": row.service_type,
        "problem_description": row.problem_description,
        "customer_location": row.customer_location,
        "price_rwf": row.price_rwf,
        "duration_minutes": row.duration_minutes,
        "scheduled_date": row.scheduled_date,
        "customer_notes": row.customer_notes,
        "technician_notes": row.technician_notes,
        "status": row.status,
        "created_at": row.created_at,
        "updated_at": row.updated_at,
        "confirmed_at": row.confirmed_at,
        "scheduled_at": row.scheduled_at,
        "completed_at": row.completed_at,
        "cancelled_at": row.cancelled_at,
        "customer": {
            "id": row.customer_id,
            "full_name": row.customer_name.unwrap_or_else(|| "Anonymous Customer".to_string()),
            "phone_number": row.customer_phone.unwrap_or_else(|| "+250 000 000 000".to_string()),
            "email": row.customer_email.unwrap_or_else(|| "anonymous@techcare.rw".to_string()),
        }
    })
}
