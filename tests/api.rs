use actix_web::{http::header, http::StatusCode, test, web, App};
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;

use techcare::{
    auth, configure_app, db, error::json_error_handler, models::Role, state::AppState,
};

const PASSWORD: &str = "s3cret";

async fn setup_state() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    db::run_migrations(&pool).await.expect("migrations");
    db::seed_defaults(&pool).await.expect("seed");
    AppState::new(pool)
}

async fn create_user(state: &AppState, email: &str, full_name: &str, role: Role) -> String {
    let id = auth::new_id();
    let hash = auth::hash_password(PASSWORD).expect("hash");
    sqlx::query(
        r#"INSERT INTO users (id, email, full_name, phone_number, role, password_hash, active, created_at)
           VALUES (?, ?, ?, '+250 788 111 222', ?, ?, 1, ?)"#,
    )
    .bind(&id)
    .bind(email)
    .bind(full_name)
    .bind(role.as_str())
    .bind(&hash)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .expect("insert user");

    if role == Role::Technician {
        sqlx::query(
            r#"INSERT INTO technician_details (user_id, specialization, hourly_rate_rwf, is_available, updated_at)
               VALUES (?, 'Computer repair', 5000, 1, ?)"#,
        )
        .bind(&id)
        .bind(Utc::now().to_rfc3339())
        .execute(&state.db)
        .await
        .expect("insert technician details");
    }

    id
}

fn basic(email: &str) -> (header::HeaderName, String) {
    let token =
        base64::engine::general_purpose::STANDARD.encode(format!("{email}:{PASSWORD}"));
    (header::AUTHORIZATION, format!("Basic {token}"))
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .app_data(web::JsonConfig::default().error_handler(json_error_handler))
                .configure(configure_app),
        )
        .await
    };
}

fn booking_body(customer_id: &str, technician_id: &str) -> Value {
    json!({
        "customer_id": customer_id,
        "technician_id": technician_id,
        "service_id": 1,
        "service_type": "Computer Support",
        "problem_description": "Laptop will not boot",
        "customer_location": "Kigali, Nyarugenge",
        "price_rwf": "8000"
    })
}

macro_rules! create_booking_via_api {
    ($app:expr, $customer_email:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/bookings")
            .insert_header(basic($customer_email))
            .set_json($body)
            .to_request();
        let resp: Value = test::call_and_read_body_json(&$app, req).await;
        assert_eq!(resp["success"], json!(true), "create booking failed: {resp}");
        resp["booking"].clone()
    }};
}

#[actix_web::test]
async fn technician_confirms_booking_with_mixed_case_status() {
    let state = setup_state().await;
    let customer = create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let booking = create_booking_via_api!(app, "alice@techcare.rw", booking_body(&customer, &technician));
    assert_eq!(booking["status"], json!("pending"));

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}/status", booking["id"].as_str().unwrap()))
        .insert_header(basic("jean@techcare.rw"))
        .set_json(json!({ "status": "Confirmed" }))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["success"], json!(true));
    assert_eq!(resp["booking"]["status"], json!("confirmed"));
    assert!(resp["booking"]["confirmed_at"].is_string());
    assert!(resp["booking"]["scheduled_at"].is_null());
    assert!(resp["booking"]["completed_at"].is_null());
    assert!(resp["booking"]["cancelled_at"].is_null());
    assert_eq!(resp["message"], json!("Booking status updated to confirmed"));
}

#[actix_web::test]
async fn bogus_status_is_rejected_without_mutation() {
    let state = setup_state().await;
    let customer = create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let booking = create_booking_via_api!(app, "alice@techcare.rw", booking_body(&customer, &technician));
    let id = booking["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{id}/status"))
        .insert_header(basic("jean@techcare.rw"))
        .set_json(json!({ "status": "bogus" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookings/{id}"))
        .insert_header(basic("alice@techcare.rw"))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["booking"]["status"], json!("pending"));
    assert!(resp["booking"]["confirmed_at"].is_null());
}

#[actix_web::test]
async fn missing_booking_returns_404_with_the_id() {
    let state = setup_state().await;
    create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/bookings/no-such-booking")
        .insert_header(basic("alice@techcare.rw"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("no-such-booking"));
}

#[actix_web::test]
async fn create_booking_enumerates_missing_fields() {
    let state = setup_state().await;
    create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .insert_header(basic("alice@techcare.rw"))
        .set_json(json!({ "service_type": "Computer Support" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("customer_id"));
    assert!(message.contains("technician_id"));
    assert!(message.contains("price_rwf"));
    assert!(message.contains("service_id"));
    assert!(!message.contains("service_type"));
}

#[actix_web::test]
async fn customer_may_cancel_but_not_complete_own_booking() {
    let state = setup_state().await;
    let customer = create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let booking = create_booking_via_api!(app, "alice@techcare.rw", booking_body(&customer, &technician));
    let id = booking["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{id}/status"))
        .insert_header(basic("alice@techcare.rw"))
        .set_json(json!({ "status": "completed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{id}/status"))
        .insert_header(basic("alice@techcare.rw"))
        .set_json(json!({ "status": "cancelled" }))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], json!(true));
    assert_eq!(resp["booking"]["status"], json!("cancelled"));
    assert!(resp["booking"]["cancelled_at"].is_string());
}

#[actix_web::test]
async fn unrelated_technician_is_forbidden() {
    let state = setup_state().await;
    let customer = create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    create_user(&state, "eric@techcare.rw", "Eric Mugisha", Role::Technician).await;
    let app = app!(state);

    let booking = create_booking_via_api!(app, "alice@techcare.rw", booking_body(&customer, &technician));
    let id = booking["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{id}/status"))
        .insert_header(basic("eric@techcare.rw"))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn terminal_booking_rejects_further_transitions() {
    let state = setup_state().await;
    let customer = create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let booking = create_booking_via_api!(app, "alice@techcare.rw", booking_body(&customer, &technician));
    let id = booking["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{id}/status"))
        .insert_header(basic("jean@techcare.rw"))
        .set_json(json!({ "status": "completed" }))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], json!(true));

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{id}/status"))
        .insert_header(basic("jean@techcare.rw"))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn stale_expected_status_is_a_conflict() {
    let state = setup_state().await;
    let customer = create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let booking = create_booking_via_api!(app, "alice@techcare.rw", booking_body(&customer, &technician));
    let id = booking["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{id}/status"))
        .insert_header(basic("jean@techcare.rw"))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{id}/status"))
        .insert_header(basic("jean@techcare.rw"))
        .set_json(json!({ "status": "in_progress", "expected_status": "pending" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn availability_rejects_non_boolean_without_mutation() {
    let state = setup_state().await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let before: (String,) =
        sqlx::query_as("SELECT updated_at FROM technician_details WHERE user_id = ?")
            .bind(&technician)
            .fetch_one(&state.db)
            .await
            .unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/technicians/{technician}/availability"))
        .insert_header(basic("jean@techcare.rw"))
        .set_json(json!({ "is_available": "yes" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));

    let after: (String,) =
        sqlx::query_as("SELECT updated_at FROM technician_details WHERE user_id = ?")
            .bind(&technician)
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert_eq!(before, after);
}

#[actix_web::test]
async fn availability_repeat_toggle_still_refreshes_timestamp() {
    let state = setup_state().await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let req = test::TestRequest::put()
        .uri(&format!("/api/technicians/{technician}/availability"))
        .insert_header(basic("jean@techcare.rw"))
        .set_json(json!({ "is_available": true }))
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["success"], json!(true));
    assert_eq!(first["technician"]["is_available"], json!(true));

    let req = test::TestRequest::put()
        .uri(&format!("/api/technicians/{technician}/availability"))
        .insert_header(basic("jean@techcare.rw"))
        .set_json(json!({ "is_available": true }))
        .to_request();
    let second: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(second["success"], json!(true));
    assert_ne!(
        first["technician"]["updated_at"],
        second["technician"]["updated_at"]
    );
}

#[actix_web::test]
async fn availability_of_another_technician_is_forbidden() {
    let state = setup_state().await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    create_user(&state, "eric@techcare.rw", "Eric Mugisha", Role::Technician).await;
    let app = app!(state);

    let req = test::TestRequest::put()
        .uri(&format!("/api/technicians/{technician}/availability"))
        .insert_header(basic("eric@techcare.rw"))
        .set_json(json!({ "is_available": false }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn booking_lists_are_scoped_and_newest_first() {
    let state = setup_state().await;
    let customer = create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let first = create_booking_via_api!(app, "alice@techcare.rw", booking_body(&customer, &technician));
    let second = create_booking_via_api!(app, "alice@techcare.rw", booking_body(&customer, &technician));

    // Force distinct created_at ordering; wall-clock inserts in the same
    // test can land on the same timestamp.
    sqlx::query("UPDATE bookings SET created_at = '2030-01-01T00:00:00+00:00' WHERE id = ?")
        .bind(second["id"].as_str().unwrap())
        .execute(&state.db)
        .await
        .unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookings/customer/{customer}"))
        .insert_header(basic("alice@techcare.rw"))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    let bookings = resp["bookings"].as_array().unwrap();
    assert_eq!(bookings.len(), 2);
    assert_eq!(bookings[0]["id"], second["id"]);
    assert_eq!(bookings[1]["id"], first["id"]);

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookings/technician/{technician}"))
        .insert_header(basic("jean@techcare.rw"))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["count"], json!(2));
    assert_eq!(
        resp["bookings"][0]["customer"]["full_name"],
        json!("Alice Uwase")
    );
}

#[actix_web::test]
async fn customers_cannot_book_on_behalf_of_others() {
    let state = setup_state().await;
    create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let other = create_user(&state, "bob@techcare.rw", "Bob Noel", Role::Customer).await;
    let technician = create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .insert_header(basic("alice@techcare.rw"))
        .set_json(booking_body(&other, &technician))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn protected_routes_require_credentials() {
    let state = setup_state().await;
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/bookings/some-id")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn session_reports_role_and_home_route() {
    let state = setup_state().await;
    create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/session")
        .insert_header(basic("jean@techcare.rw"))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], json!(true));
    assert_eq!(resp["user"]["role"], json!("TECHNICIAN"));
    assert_eq!(resp["home_route"], json!("/technician/dashboard"));
}

#[actix_web::test]
async fn login_redirects_to_the_role_dashboard() {
    let state = setup_state().await;
    create_user(&state, "jean@techcare.rw", "Jean Baptiste", Role::Technician).await;
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/login")
        .insert_header(basic("jean@techcare.rw"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/technician/dashboard"
    );
}

#[actix_web::test]
async fn admin_endpoints_are_role_guarded() {
    let state = setup_state().await;
    create_user(&state, "alice@techcare.rw", "Alice Uwase", Role::Customer).await;
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/admin/stats")
        .insert_header(basic("alice@techcare.rw"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
