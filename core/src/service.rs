use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::{
    DateRange, Instruction, NewPlannedMeal, NewRecipe, PlannedMeal, PlannedMealChanges,
    PlannedMealRef, PlannedMealUpdate, Recipe, RecipeUpdate, ScaledRecipe, ShoppingList,
    ShoppingListItem, validate_new_planned_meal, validate_new_recipe,
    validate_planned_meal_update, validate_recipe,
};
use crate::scale::{ZeroTargetPolicy, resolve_target, scale_recipe};
use crate::shopping::{generate, merge_checked, toggle};
use crate::week::{WeekPlan, WeekWindow};

/// Where recipes, planned meals and stored shopping lists live.
///
/// The CLI implements this over HTTP, tests with `MemoryStore`.
/// Methods block; async callers should invoke `PantryService` from a
/// blocking task.
pub trait RecipeStore: Send + Sync {
    /// All recipes. Ingredients may be omitted in this listing.
    fn list_recipes(&self) -> Result<Vec<Recipe>>;
    fn get_recipe(&self, id: i64) -> Result<Option<Recipe>>;
    fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe>;
    /// Replace the stored fields and steps of `recipe.id`; ingredients are
    /// left untouched. `false` when no such recipe exists.
    fn update_recipe(&self, recipe: &Recipe) -> Result<bool>;
    fn delete_recipe(&self, id: i64) -> Result<bool>;

    fn list_instructions(&self, recipe_id: i64) -> Result<Vec<Instruction>>;

    fn list_planned_meals(&self, range: DateRange) -> Result<Vec<PlannedMealRef>>;
    fn add_planned_meal(&self, meal: &NewPlannedMeal) -> Result<()>;
    fn update_planned_meal(&self, id: i64, update: &PlannedMealUpdate) -> Result<bool>;
    fn delete_planned_meal(&self, id: i64) -> Result<bool>;

    /// Build and persist a list for `range`. Every item starts unchecked.
    fn generate_shopping_list(&self, range: DateRange) -> Result<ShoppingList>;
    fn get_shopping_list(&self, id: i64) -> Result<Option<ShoppingList>>;
    fn toggle_item(&self, item_id: i64) -> Result<()>;
}

pub struct PantryService<S> {
    store: S,
    zero_target: ZeroTargetPolicy,
}

impl<S: RecipeStore> PantryService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            zero_target: ZeroTargetPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_zero_target(mut self, policy: ZeroTargetPolicy) -> Self {
        self.zero_target = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // --- Recipes ---

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        self.store.list_recipes()
    }

    pub fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        self.store.get_recipe(id)
    }

    pub fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        validate_new_recipe(recipe)?;
        let created = self.store.create_recipe(recipe)?;
        debug!(id = created.id, name = %created.name, "recipe created");
        Ok(created)
    }

    /// Apply `update` to a stored recipe and return it as stored afterwards.
    /// `None` when the recipe does not exist.
    pub fn update_recipe(&self, id: i64, update: &RecipeUpdate) -> Result<Option<Recipe>> {
        let Some(current) = self.store.get_recipe(id)? else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(current));
        }
        let updated = update.apply(&current);
        validate_recipe(&updated)?;
        if !self.store.update_recipe(&updated)? {
            return Ok(None);
        }
        debug!(id, name = %updated.name, steps = updated.instructions.len(), "recipe updated");
        self.store.get_recipe(id)
    }

    pub fn delete_recipe(&self, id: i64) -> Result<bool> {
        self.store.delete_recipe(id)
    }

    pub fn instructions(&self, recipe_id: i64) -> Result<Vec<Instruction>> {
        self.store.list_instructions(recipe_id)
    }

    /// Scale a stored recipe. `servings` is raw user input; `None` keeps the
    /// recipe's own servings. Returns `None` when the recipe does not exist.
    pub fn scale_recipe(&self, id: i64, servings: Option<i64>) -> Result<Option<ScaledRecipe>> {
        let Some(recipe) = self.store.get_recipe(id)? else {
            return Ok(None);
        };
        let target = resolve_target(servings, &recipe, self.zero_target)?;
        Ok(Some(scale_recipe(&recipe, target)?))
    }

    // --- Planner ---

    pub fn add_planned_meal(&self, meal: &NewPlannedMeal) -> Result<()> {
        validate_new_planned_meal(meal)?;
        self.store.add_planned_meal(meal)
    }

    /// Change the recipe, slot or servings of the meal `id` planned on
    /// `date`. `None` when no such meal is planned that day.
    pub fn update_planned_meal(
        &self,
        id: i64,
        date: NaiveDate,
        changes: &PlannedMealChanges,
    ) -> Result<Option<PlannedMealRef>> {
        let day = DateRange::single(date);
        let Some(current) = self
            .store
            .list_planned_meals(day)?
            .into_iter()
            .find(|m| m.id == id && m.date == date)
        else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(current));
        }

        let update = changes.apply(&current);
        validate_planned_meal_update(&update)?;
        let recipe_changed = update.recipe_id != current.recipe_id;
        if recipe_changed && self.store.get_recipe(update.recipe_id)?.is_none() {
            bail!("Recipe {} not found", update.recipe_id);
        }
        if !self.store.update_planned_meal(id, &update)? {
            return Ok(None);
        }
        debug!(id, %date, slot = %update.slot, "planned meal updated");
        Ok(self
            .store
            .list_planned_meals(day)?
            .into_iter()
            .find(|m| m.id == id))
    }

    pub fn delete_planned_meal(&self, id: i64) -> Result<bool> {
        self.store.delete_planned_meal(id)
    }

    /// Planned meals in `range` with their full recipes, ordered by date and
    /// slot. Each distinct recipe is fetched once.
    pub fn planned_meals(&self, range: DateRange) -> Result<Vec<PlannedMeal>> {
        let refs: Vec<PlannedMealRef> = self
            .store
            .list_planned_meals(range)?
            .into_iter()
            .filter(|r| range.contains(r.date))
            .collect();

        let mut recipes: BTreeMap<i64, Recipe> = BTreeMap::new();
        for r in &refs {
            if recipes.contains_key(&r.recipe_id) {
                continue;
            }
            let Some(recipe) = self
                .store
                .get_recipe(r.recipe_id)
                .with_context(|| format!("Failed to load recipe {}", r.recipe_id))?
            else {
                bail!(
                    "Planned meal {} refers to recipe {} ('{}') which no longer exists",
                    r.id,
                    r.recipe_id,
                    r.recipe_name
                );
            };
            recipes.insert(r.recipe_id, recipe);
        }
        debug!(meals = refs.len(), recipes = recipes.len(), %range, "joined planned meals");

        let mut meals: Vec<PlannedMeal> = refs
            .into_iter()
            .filter_map(|r| {
                let recipe = recipes.get(&r.recipe_id)?.clone();
                Some(r.with_recipe(recipe))
            })
            .collect();
        meals.sort_by_key(|m| (m.date, m.slot, m.id));
        Ok(meals)
    }

    /// The Monday-first week containing `anchor`, shifted by `offset` weeks.
    pub fn week_plan(&self, anchor: NaiveDate, offset: i64) -> Result<WeekPlan> {
        let window = WeekWindow::containing(anchor)?
            .shift(offset)
            .with_context(|| format!("Week offset {offset} is out of range"))?;
        let meals = self.planned_meals(window.range())?;
        Ok(WeekPlan::build(window, meals))
    }

    // --- Shopping lists ---

    /// Aggregate the list in-process without touching stored lists.
    pub fn shopping_list_local(
        &self,
        range: DateRange,
        previous: Option<&ShoppingList>,
    ) -> Result<ShoppingList> {
        let meals = self.planned_meals(range)?;
        Ok(generate(&meals, range, previous)?)
    }

    /// Have the store generate the list, then carry checked flags over from
    /// `previous` and persist them.
    pub fn shopping_list_remote(
        &self,
        range: DateRange,
        previous: Option<&ShoppingList>,
    ) -> Result<ShoppingList> {
        let mut list = self
            .store
            .generate_shopping_list(range)
            .with_context(|| format!("Failed to generate shopping list for {range}"))?;
        let changed = merge_checked(&mut list, previous);
        for item_id in changed {
            self.store.toggle_item(item_id).with_context(|| {
                format!("Failed to restore checked state of item {item_id}")
            })?;
        }
        Ok(list)
    }

    pub fn get_shopping_list(&self, id: i64) -> Result<Option<ShoppingList>> {
        self.store.get_shopping_list(id)
    }

    /// Flip one item in `list` immediately. For a stored list the toggle is
    /// then persisted; if that fails `list` is reloaded from the store (or
    /// the flip undone) and the error is returned.
    pub fn toggle_item(
        &self,
        list: &mut ShoppingList,
        item_id: i64,
    ) -> Result<ShoppingListItem> {
        let item = toggle(list, item_id)?.clone();
        let Some(list_id) = list.id else {
            return Ok(item);
        };

        match self.store.toggle_item(item_id) {
            Ok(()) => Ok(item),
            Err(e) => {
                warn!(list_id, item_id, error = %e, "toggle failed, reconciling");
                match self.store.get_shopping_list(list_id) {
                    Ok(Some(fresh)) => *list = fresh,
                    _ => {
                        toggle(list, item_id)?;
                    }
                }
                Err(e.context(format!("Failed to update item {item_id}")))
            }
        }
    }
}
