//! Role-based access policy: the single source of truth for "who may see
//! what, and where to send them otherwise". Route tables and actor rules
//! live here and nowhere else; handlers pass a role in and get a route out.

use crate::models::{BookingStatus, Role};

pub const LOGIN_ROUTE: &str = "/login";
pub const CUSTOMER_DASHBOARD: &str = "/dashboard";
pub const TECHNICIAN_DASHBOARD: &str = "/technician/dashboard";
pub const ADMIN_DASHBOARD: &str = "/admin/dashboard";

/// Authentication state as seen by a consumer at decision time. `Loading`
/// is distinct from `Unauthenticated`: while credentials are still being
/// resolved no allow/deny decision may be made, otherwise a client renders
/// (or redirects away from) content it should not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    Unauthenticated,
    Authenticated {
        user_id: String,
        /// `None` when the stored role string is unrecognized; such accounts
        /// are still authenticated and fall back to the default dashboard.
        role: Option<Role>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Auth state unresolved; re-evaluate once it settles.
    Pending,
    Allow,
    Deny { redirect_to: &'static str },
}

/// Home route for a role. Unknown roles map to the customer dashboard
/// rather than erroring.
pub fn home_route(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Technician) => TECHNICIAN_DASHBOARD,
        Some(Role::Admin) => ADMIN_DASHBOARD,
        Some(Role::Customer) | None => CUSTOMER_DASHBOARD,
    }
}

/// Decide whether a request may proceed. Pure: the caller performs any
/// navigation. `allowed_roles = None` means any authenticated identity is
/// acceptable (or anyone at all when `require_auth` is false).
pub fn evaluate(auth: &AuthState, require_auth: bool, allowed_roles: Option<&[Role]>) -> Decision {
    if matches!(auth, AuthState::Loading) {
        return Decision::Pending;
    }

    if require_auth && matches!(auth, AuthState::Unauthenticated) {
        return Decision::Deny {
            redirect_to: LOGIN_ROUTE,
        };
    }

    if let (Some(allowed), AuthState::Authenticated { role, .. }) = (allowed_roles, auth) {
        let member = role.map_or(false, |r| allowed.contains(&r));
        if !member {
            return Decision::Deny {
                redirect_to: home_route(*role),
            };
        }
    }

    Decision::Allow
}

/// Per-booking actor rule: the assigned technician may move the booking to
/// any status; the customer who opened it may only cancel it. Everyone
/// else is denied, admins included.
pub fn may_transition(
    customer_id: &str,
    technician_id: Option<&str>,
    actor_id: &str,
    target: BookingStatus,
) -> bool {
    if technician_id == Some(actor_id) {
        return true;
    }
    customer_id == actor_id && target == BookingStatus::Cancelled
}
