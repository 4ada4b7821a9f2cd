//! Client-side mirror of the week, kept in sync with the day API.

pub mod api;
mod demo;
pub mod model;
pub mod view_model;

use thiserror::Error;

pub use api::{DayApi, HttpDayApi, Week};
pub use demo::demo_week;
pub use model::{Food, Meal, MEAL_TYPES};
pub use view_model::{Mode, PlannerViewModel};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode meals for {day}: {source}")]
    Decode {
        day: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{day} holds meals this client cannot read: {reason}")]
    UnreadableDay { day: String, reason: String },

    #[error("invalid base url {0}")]
    BaseUrl(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("no meal {meal_id} on {day}")]
    MealNotFound { day: String, meal_id: String },

    #[error("no food {food_id} in meal {meal_id}")]
    FoodNotFound { meal_id: String, food_id: String },
}

impl ClientError {
    /// True when the server could not be reached at all, as opposed to a
    /// server that answered with something unusable.
    pub fn is_unreachable(&self) -> bool {
        match self {
            ClientError::Network(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
