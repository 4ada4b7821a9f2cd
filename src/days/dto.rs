use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::StoreHealth;

/// `PUT /meals/:day` and `GET /meals/:day`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DayResponse {
    pub day: String,
    pub data: Vec<Value>,
}

/// `PUT /meals/:day/:index`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MealAtIndexResponse {
    pub day: String,
    pub index: i64,
    pub data: Value,
}

/// `POST /meals/:day`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedDayResponse {
    pub day: String,
}

/// `ok` is false when the store's data cannot be read.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub db: String,
    pub store: StoreHealth,
}
