use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MEAL_TYPES: [&str; 4] = ["Café da manhã", "Almoço", "Lanche", "Jantar"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    pub id: String,
    pub name: String,
    /// Free text, e.g. "2 fatias" or "150g".
    pub quantity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meal {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<String>,
    #[serde(default)]
    pub foods: Vec<Food>,
}

impl Meal {
    pub fn for_type(meal_type: &str) -> Self {
        Self {
            id: new_id(),
            name: meal_type.to_string(),
            meal_type: Some(meal_type.to_string()),
            foods: Vec::new(),
        }
    }

    /// Matches on `meal_type`, falling back to the name for meals saved
    /// without one.
    pub fn is_type(&self, meal_type: &str) -> bool {
        self.meal_type.as_deref().unwrap_or(&self.name) == meal_type
    }
}

impl Food {
    pub fn new(name: &str, quantity: &str) -> Self {
        Self {
            id: new_id(),
            name: name.trim().to_string(),
            quantity: quantity.trim().to_string(),
        }
    }

    /// Same food under a fresh id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: new_id(),
            ..self.clone()
        }
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
