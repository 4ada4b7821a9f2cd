use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};

use super::{is_known_day, DAYS};
use crate::error::AppError;
use crate::store::{json_kind, DayStore, StoredDay};

/// Every persisted day plus the fixed week, absent days mapped to `[]`.
pub async fn all_days(store: &dyn DayStore) -> Result<BTreeMap<String, Vec<Value>>, AppError> {
    let mut all = store.get_all_days().await?;
    for day in DAYS {
        all.entry(day.to_string()).or_default();
    }
    Ok(all)
}

pub async fn day_or_empty(store: &dyn DayStore, day: &str) -> Result<Vec<Value>, AppError> {
    Ok(store.get_day(day).await?.unwrap_or_default())
}

/// Full replace of a day; also serves `POST`, which has no separate create
/// semantics for day documents.
pub async fn replace_day(
    store: &dyn DayStore,
    day: &str,
    payload: Value,
) -> Result<StoredDay, AppError> {
    let meals = meals_payload(payload)?;
    warn_if_unknown(day);
    let stored = store.upsert_day(day, meals).await?;
    info!(day = %stored.day, meals = stored.data.len(), "day replaced");
    Ok(stored)
}

/// Replaces one element of a day's array. The bounds check and the write
/// happen under the store's per-day lock.
pub async fn replace_meal_at(
    store: &dyn DayStore,
    day: &str,
    raw_index: &str,
    meal: Value,
) -> Result<(i64, Value), AppError> {
    let index = parse_index(raw_index)?;
    if !meal.is_object() {
        return Err(AppError::InvalidPayload(format!(
            "payload must be a meal object, got {}",
            json_kind(&meal)
        )));
    }
    warn_if_unknown(day);

    let replacement = meal.clone();
    store
        .modify_day(
            day,
            Box::new(move |mut meals: Vec<Value>| {
                let slot = checked_slot(index, meals.len())?;
                meals[slot] = replacement;
                Ok(meals)
            }),
        )
        .await?;

    info!(%day, index, "meal replaced");
    Ok((index, meal))
}

pub fn meals_payload(payload: Value) -> Result<Vec<Value>, AppError> {
    match payload {
        Value::Array(meals) => Ok(meals),
        other => Err(AppError::InvalidPayload(format!(
            "payload must be an array of meals, got {}",
            json_kind(&other)
        ))),
    }
}

fn parse_index(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::InvalidPayload(format!("invalid meal index {raw:?}")))
}

fn checked_slot(index: i64, len: usize) -> Result<usize, AppError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(AppError::IndexOutOfRange { index, len })
}

fn warn_if_unknown(day: &str) {
    if !is_known_day(day) {
        warn!(%day, "unknown day name; accepting anyway");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileReadPolicy;
    use crate::store::FileDayStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (FileDayStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileDayStore::new(dir.path().join("meals.json"), FileReadPolicy::Lenient);
        (store, dir)
    }

    #[tokio::test]
    async fn all_days_defaults_every_weekday() {
        let (store, _dir) = setup();
        replace_day(&store, "Segunda", json!([{"food_name": "Banana", "quantity": "1"}]))
            .await
            .unwrap();

        let all = all_days(&store).await.unwrap();
        assert_eq!(all.len(), 7);
        assert_eq!(all["Segunda"], vec![json!({"food_name": "Banana", "quantity": "1"})]);
        for day in DAYS.iter().filter(|d| **d != "Segunda") {
            assert!(all[*day].is_empty(), "{day} should default to []");
        }
    }

    #[tokio::test]
    async fn all_days_keeps_unknown_days() {
        let (store, _dir) = setup();
        replace_day(&store, "Feriado", json!([])).await.unwrap();
        let all = all_days(&store).await.unwrap();
        assert_eq!(all.len(), 8);
        assert!(all.contains_key("Feriado"));
    }

    #[tokio::test]
    async fn replace_day_rejects_non_arrays_and_keeps_stored_value() {
        let (store, _dir) = setup();
        replace_day(&store, "Terça", json!([{"name": "Almoço"}])).await.unwrap();

        for bad in [json!({"name": "x"}), json!("x"), json!(3), Value::Null] {
            let err = replace_day(&store, "Terça", bad).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidPayload(_)));
        }
        assert_eq!(
            day_or_empty(&store, "Terça").await.unwrap(),
            vec![json!({"name": "Almoço"})]
        );
    }

    #[tokio::test]
    async fn replace_meal_at_swaps_one_element() {
        let (store, _dir) = setup();
        replace_day(&store, "Quinta", json!([{"n": 0}, {"n": 1}, {"n": 2}]))
            .await
            .unwrap();

        let (index, meal) = replace_meal_at(&store, "Quinta", "1", json!({"n": "new"}))
            .await
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(meal, json!({"n": "new"}));
        assert_eq!(
            day_or_empty(&store, "Quinta").await.unwrap(),
            vec![json!({"n": 0}), json!({"n": "new"}), json!({"n": 2})]
        );
    }

    #[tokio::test]
    async fn replace_meal_at_out_of_range_leaves_day_untouched() {
        let (store, _dir) = setup();
        let meals = json!([{"n": 0}, {"n": 1}]);
        replace_day(&store, "Segunda", meals.clone()).await.unwrap();

        for raw in ["5", "2", "-1"] {
            let err = replace_meal_at(&store, "Segunda", raw, json!({"n": 9}))
                .await
                .unwrap_err();
            assert!(
                matches!(err, AppError::IndexOutOfRange { len: 2, .. }),
                "index {raw} gave {err:?}"
            );
        }
        assert_eq!(Value::Array(day_or_empty(&store, "Segunda").await.unwrap()), meals);
    }

    #[tokio::test]
    async fn replace_meal_at_on_missing_day_is_out_of_range() {
        let (store, _dir) = setup();
        let err = replace_meal_at(&store, "Domingo", "0", json!({})).await.unwrap_err();
        assert!(matches!(err, AppError::IndexOutOfRange { index: 0, len: 0 }));
        assert_eq!(store.get_day("Domingo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn replace_meal_at_validates_index_and_body() {
        let (store, _dir) = setup();
        replace_day(&store, "Sexta", json!([{}])).await.unwrap();

        let err = replace_meal_at(&store, "Sexta", "abc", json!({})).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));
        let err = replace_meal_at(&store, "Sexta", "0", json!([1])).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));
    }
}
