use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, instrument, warn};

use super::{
    api::DayApi,
    demo::demo_week,
    model::{Food, Meal},
    ClientError,
};
use crate::days::DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `load` has not run yet.
    Unloaded,
    Online,
    /// The API could not be reached at load time; stays so for the session.
    Offline,
}

/// In-memory mirror of the week.
///
/// Every mutation snapshots the affected day, applies the change locally,
/// then reconciles: online, the whole day is pushed and the server's array
/// replaces the local one (or the snapshot is restored if the push fails);
/// offline, the change stays local and the day is marked pending.
pub struct PlannerViewModel<A> {
    api: A,
    mode: Mode,
    days: BTreeMap<String, Vec<Meal>>,
    pending: BTreeSet<String>,
    // Days the server holds in a shape `Meal` cannot read. They are shown
    // empty and refuse edits, so a push never overwrites them.
    unreadable: BTreeMap<String, String>,
}

impl<A: DayApi> PlannerViewModel<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            mode: Mode::Unloaded,
            days: BTreeMap::new(),
            pending: BTreeSet::new(),
            unreadable: BTreeMap::new(),
        }
    }

    /// Loads the week. Only an unreachable server switches to demo data;
    /// any other failure is returned and the view-model stays unloaded.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<Mode, ClientError> {
        match self.api.fetch_all().await {
            Ok(week) => {
                self.days.clear();
                self.unreadable.clear();
                for (day, meals) in week {
                    match meals {
                        Ok(meals) => {
                            self.days.insert(day, meals);
                        }
                        Err(e) => {
                            warn!(%day, error = %e, "day kept read-only");
                            self.unreadable.insert(day, e.to_string());
                        }
                    }
                }
                self.mode = Mode::Online;
                info!(days = self.days.len(), "week loaded from api");
            }
            Err(e) if e.is_unreachable() => {
                warn!(error = %e, "api unreachable; switching to demo data");
                self.days = demo_week();
                self.mode = Mode::Offline;
            }
            Err(e) => return Err(e),
        }
        for day in DAYS {
            self.days.entry(day.to_string()).or_default();
        }
        Ok(self.mode)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn day(&self, day: &str) -> &[Meal] {
        self.days.get(day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fixed week first in display order, then any other stored days.
    pub fn days(&self) -> Vec<(&str, &[Meal])> {
        let mut out: Vec<(&str, &[Meal])> = DAYS.iter().map(|d| (*d, self.day(d))).collect();
        out.extend(
            self.days
                .iter()
                .filter(|(d, _)| !DAYS.contains(&d.as_str()))
                .map(|(d, meals)| (d.as_str(), meals.as_slice())),
        );
        out
    }

    /// Days that could not be decoded, with the reason.
    pub fn unreadable_days(&self) -> impl Iterator<Item = (&str, &str)> {
        self.unreadable.iter().map(|(d, r)| (d.as_str(), r.as_str()))
    }

    /// Days changed offline and never pushed.
    pub fn pending_days(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Re-reads one day from the server, dropping local state for it.
    /// Offline this is a no-op.
    pub async fn refresh_day(&mut self, day: &str) -> Result<(), ClientError> {
        if self.mode != Mode::Online {
            return Ok(());
        }
        match self.api.fetch_day(day).await {
            Ok(meals) => {
                self.days.insert(day.to_string(), meals);
                self.unreadable.remove(day);
                self.pending.remove(day);
                Ok(())
            }
            Err(e @ ClientError::Decode { .. }) => {
                self.days.insert(day.to_string(), Vec::new());
                self.unreadable.insert(day.to_string(), e.to_string());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Returns the new meal's id.
    pub async fn add_meal(&mut self, day: &str, meal_type: &str) -> Result<String, ClientError> {
        self.ensure_editable(day)?;
        let meal = Meal::for_type(meal_type);
        let id = meal.id.clone();
        let snapshot = self.day(day).to_vec();
        self.days.entry(day.to_string()).or_default().push(meal);
        self.commit(day, snapshot).await?;
        Ok(id)
    }

    /// Returns the new food's id.
    pub async fn add_food(
        &mut self,
        day: &str,
        meal_id: &str,
        name: &str,
        quantity: &str,
    ) -> Result<String, ClientError> {
        if name.trim().is_empty() {
            return Err(ClientError::InvalidInput("food name is required".into()));
        }
        self.ensure_editable(day)?;
        let food = Food::new(name, quantity);
        let id = food.id.clone();
        let snapshot = self.day(day).to_vec();
        self.meal_mut(day, meal_id)?.foods.push(food);
        self.commit(day, snapshot).await?;
        Ok(id)
    }

    pub async fn remove_food(
        &mut self,
        day: &str,
        meal_id: &str,
        food_id: &str,
    ) -> Result<(), ClientError> {
        self.ensure_editable(day)?;
        let snapshot = self.day(day).to_vec();
        let meal = self.meal_mut(day, meal_id)?;
        let before = meal.foods.len();
        meal.foods.retain(|f| f.id != food_id);
        if meal.foods.len() == before {
            return Err(ClientError::FoodNotFound {
                meal_id: meal_id.to_string(),
                food_id: food_id.to_string(),
            });
        }
        self.commit(day, snapshot).await
    }

    pub async fn clear_day(&mut self, day: &str) -> Result<(), ClientError> {
        self.ensure_editable(day)?;
        let snapshot = self.day(day).to_vec();
        self.days.insert(day.to_string(), Vec::new());
        self.commit(day, snapshot).await
    }

    /// Copies a meal's foods, under fresh ids, into the `meal_type` slot of
    /// `to_day`: an existing meal of that type has its foods replaced,
    /// otherwise a new meal is appended. Returns the target meal's id.
    pub async fn duplicate_meal(
        &mut self,
        from_day: &str,
        meal_id: &str,
        to_day: &str,
        meal_type: &str,
    ) -> Result<String, ClientError> {
        self.ensure_editable(to_day)?;
        let source = self
            .day(from_day)
            .iter()
            .find(|m| m.id == meal_id)
            .ok_or_else(|| ClientError::MealNotFound {
                day: from_day.to_string(),
                meal_id: meal_id.to_string(),
            })?;
        let foods: Vec<Food> = source.foods.iter().map(Food::duplicate).collect();
        if from_day == to_day && source.is_type(meal_type) {
            return Err(ClientError::InvalidInput(
                "a meal cannot be duplicated onto its own slot".into(),
            ));
        }

        let snapshot = self.day(to_day).to_vec();
        let target = self.days.entry(to_day.to_string()).or_default();
        let target_id = match target.iter_mut().find(|m| m.is_type(meal_type)) {
            Some(existing) => {
                existing.foods = foods;
                existing.id.clone()
            }
            None => {
                let mut meal = Meal::for_type(meal_type);
                meal.foods = foods;
                let id = meal.id.clone();
                target.push(meal);
                id
            }
        };
        self.commit(to_day, snapshot).await?;
        Ok(target_id)
    }

    fn ensure_editable(&self, day: &str) -> Result<(), ClientError> {
        match self.unreadable.get(day) {
            Some(reason) => Err(ClientError::UnreadableDay {
                day: day.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn meal_mut(&mut self, day: &str, meal_id: &str) -> Result<&mut Meal, ClientError> {
        self.days
            .get_mut(day)
            .and_then(|meals| meals.iter_mut().find(|m| m.id == meal_id))
            .ok_or_else(|| ClientError::MealNotFound {
                day: day.to_string(),
                meal_id: meal_id.to_string(),
            })
    }

    /// Reconciles a locally changed day, restoring `snapshot` if the server
    /// refuses it.
    async fn commit(&mut self, day: &str, snapshot: Vec<Meal>) -> Result<(), ClientError> {
        if self.mode != Mode::Online {
            self.pending.insert(day.to_string());
            debug!(%day, "change kept locally");
            return Ok(());
        }

        let pushed = self.api.replace_day(day, self.day(day)).await;
        match pushed {
            Ok(confirmed) => {
                self.days.insert(day.to_string(), confirmed);
                Ok(())
            }
            Err(e) => {
                warn!(%day, error = %e, "push failed; rolling back");
                self.days.insert(day.to_string(), snapshot);
                Err(e)
            }
        }
    }
}
