pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod policy;
pub mod routes;
pub mod state;
pub mod workflow;

use actix_web::web;

/// Registers every route group. Order matters: the public per-booking event
/// stream must be matched before the authenticated `/api/bookings` scope.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    routes::public::configure(cfg);
    routes::events::configure(cfg);
    routes::bookings::configure(cfg);
    routes::technicians::configure(cfg);
    routes::admin::configure(cfg);
}
