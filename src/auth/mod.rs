use crate::state::AppState;
use axum::Router;

pub mod cookies;
pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod refresh;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
