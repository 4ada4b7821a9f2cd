use std::collections::BTreeMap;

use super::model::{Food, Meal};
use crate::days::DAYS;

const MENU: [(&str, &[(&str, &str)]); 4] = [
    ("Café da manhã", &[("Pão integral", "2 fatias"), ("Ovo mexido", "2 unidades"), ("Café", "1 xícara")]),
    ("Almoço", &[("Arroz", "100g"), ("Feijão", "1 concha"), ("Frango grelhado", "120g"), ("Salada", "à vontade")]),
    ("Lanche", &[("Iogurte natural", "1 pote"), ("Banana", "1")]),
    ("Jantar", &[("Omelete", "2 ovos"), ("Legumes cozidos", "150g")]),
];

/// Fixed week shown when the API cannot be reached. Ids are stable so the
/// offline session can address them.
pub fn demo_week() -> BTreeMap<String, Vec<Meal>> {
    DAYS.iter()
        .enumerate()
        .map(|(d, day)| {
            let meals = MENU
                .iter()
                .enumerate()
                .map(|(m, (meal_type, foods))| Meal {
                    id: format!("demo-{d}-{m}"),
                    name: meal_type.to_string(),
                    meal_type: Some(meal_type.to_string()),
                    foods: foods
                        .iter()
                        .enumerate()
                        .map(|(f, (name, quantity))| Food {
                            id: format!("demo-{d}-{m}-{f}"),
                            name: name.to_string(),
                            quantity: quantity.to_string(),
                        })
                        .collect(),
                })
                .collect();
            (day.to_string(), meals)
        })
        .collect()
}
