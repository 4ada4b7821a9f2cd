mod dto;
pub mod handlers;
pub mod services;

use crate::state::AppState;
use axum::Router;

/// Display order of the planner week.
pub const DAYS: [&str; 7] = [
    "Segunda", "Terça", "Quarta", "Quinta", "Sexta", "Sábado", "Domingo",
];

pub fn is_known_day(day: &str) -> bool {
    DAYS.contains(&day)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::day_routes())
}
