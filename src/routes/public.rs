use actix_web::{http::header, web, HttpRequest, HttpResponse};
use actix_web::http::header::Header;
use actix_web_httpauth::headers::authorization::{Authorization, Basic};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{
        authenticate_credentials, basic_validator, clear_logout_cookie, logout_cookie, AuthUser,
        AUTH_REALM,
    },
    models::ServiceRow,
    policy,
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/login").route(web::get().to(login)))
        .service(web::resource("/logout").route(web::get().to(logout)))
        .service(web::resource("/api/services").route(web::get().to(list_services)))
        .service(
            web::resource("/api/session")
                .wrap(HttpAuthentication::basic(basic_validator))
                .route(web::get().to(session)),
        );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn logout(req: HttpRequest) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/"))
        .cookie(logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

/// Authenticates Basic credentials and sends the caller to their role's
/// dashboard. A requested `next` path is honored only when it sits under
/// that dashboard; everything else falls back to the policy's home route.
async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<LoginQuery>,
) -> HttpResponse {
    let auth = match Authorization::<Basic>::parse(&req) {
        Ok(auth) => auth,
        Err(_) => return auth_challenge(),
    };
    let credentials = auth.into_scheme();
    let email = credentials.user_id();
    let password = credentials.password().unwrap_or_default();

    let user = match authenticate_credentials(&state, email, password).await {
        Some(user) => user,
        None => return auth_challenge(),
    };

    let home = policy::home_route(user.role);
    let requested = query.next.as_deref().unwrap_or("");
    let redirect = if requested.starts_with(home) {
        requested
    } else {
        home
    };

    HttpResponse::SeeOther()
        .append_header((header::LOCATION, redirect))
        .cookie(clear_logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

fn auth_challenge() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((
            header::WWW_AUTHENTICATE,
            format!("Basic realm=\"{}\"", AUTH_REALM),
        ))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

/// Resolved session for the caller: identity, role, and the home route the
/// client should navigate to. Clients never hardcode the role-to-route
/// table; this endpoint is its single external surface.
async fn session(auth: web::ReqData<AuthUser>) -> HttpResponse {
    let decision = policy::evaluate(&auth.auth_state(), true, None);
    if decision != policy::Decision::Allow {
        return auth_challenge();
    }

    HttpResponse::Ok().json(json!({
        "success": true,
        "user": {
            "id": auth.id.clone(),
            "full_name": auth.full_name.clone(),
            "role": auth.role,
        },
        "home_route": policy::home_route(auth.role)
    }))
}

async fn list_services(state: web::Data<AppState>) -> HttpResponse {
    let services = sqlx::query_as::<_, ServiceRow>(
        "SELECT * FROM services WHERE active = 1 ORDER BY id",
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    HttpResponse::Ok().json(json!({ "success": true, "services": services }))
}
