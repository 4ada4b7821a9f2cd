//! Persistence for day documents: one JSON array of meals per day name.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::AppError;

pub mod file;
pub mod postgres;

pub use file::{FileDayStore, FileSnapshot};
pub use postgres::PgDayStore;

/// A day's meal list as persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDay {
    pub day: String,
    pub data: Vec<Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// What `/health` reports about the backing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    Ready,
    /// The backing file exists but cannot be parsed.
    Unreadable,
}

/// Transformation applied to a day's current meals inside [`DayStore::modify_day`].
/// Returning an error aborts the write and leaves the stored day untouched.
pub type DayMutator = Box<dyn FnOnce(Vec<Value>) -> Result<Vec<Value>, AppError> + Send>;

#[async_trait]
pub trait DayStore: Send + Sync {
    /// Backend label reported by `/health`.
    fn kind(&self) -> &'static str;

    async fn health(&self) -> StoreHealth {
        StoreHealth::Ready
    }

    /// Every persisted day. Days never written are not synthesized here.
    async fn get_all_days(&self) -> Result<BTreeMap<String, Vec<Value>>, AppError>;

    /// The stored array, or `None` if the day was never written.
    async fn get_day(&self, day: &str) -> Result<Option<Vec<Value>>, AppError>;

    /// Inserts or fully replaces a day. `updated_at` moves on every call,
    /// `created_at` is kept from the first insert.
    async fn upsert_day(&self, day: &str, meals: Vec<Value>) -> Result<StoredDay, AppError>;

    /// Read-modify-write of one day without interleaving other writers of
    /// the same day. A missing day is handed to the mutator as `[]`.
    async fn modify_day(&self, day: &str, mutate: DayMutator) -> Result<StoredDay, AppError>;
}

/// Coerces a stored document into a meal list. Anything but an array counts
/// as empty.
pub(crate) fn meals_from_document(day: &str, doc: Value) -> Vec<Value> {
    match doc {
        Value::Array(meals) => meals,
        other => {
            tracing::warn!(%day, kind = json_kind(&other), "stored day is not an array; treating as empty");
            Vec::new()
        }
    }
}

pub(crate) fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_array_documents_read_as_empty() {
        assert!(meals_from_document("Segunda", json!({"a": 1})).is_empty());
        assert!(meals_from_document("Segunda", Value::Null).is_empty());
        assert_eq!(
            meals_from_document("Segunda", json!([{"name": "Almoço"}])),
            vec![json!({"name": "Almoço"})]
        );
    }

    #[test]
    fn stored_day_serializes_rfc3339_timestamps() {
        let at = time::macros::datetime!(2024-03-01 12:00 UTC);
        let stored = StoredDay {
            day: "Terça".into(),
            data: vec![],
            created_at: at,
            updated_at: at,
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["created_at"], "2024-03-01T12:00:00Z");
        assert_eq!(json["data"], json!([]));
    }
}
