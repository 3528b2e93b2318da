use axum::Router;

pub mod packages;
pub mod system;

/// Router for all package-workflow endpoints.
pub fn router() -> Router {
    Router::new().nest("/packages", packages::router())
}
