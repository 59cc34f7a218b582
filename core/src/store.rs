use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow, bail};

use crate::error::PlanError;
use crate::models::{
    DateRange, Instruction, NewPlannedMeal, NewRecipe, PlannedMealRef, PlannedMealUpdate, Recipe,
    ShoppingList, validate_new_planned_meal, validate_new_recipe, validate_planned_meal_update,
    validate_recipe,
};
use crate::service::RecipeStore;
use crate::shopping::generate;

#[derive(Default)]
struct Inner {
    recipes: BTreeMap<i64, Recipe>,
    meals: BTreeMap<i64, PlannedMealRef>,
    lists: BTreeMap<i64, ShoppingList>,
    last_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// In-process `RecipeStore` with the backend's rules: one meal per date and
/// slot, server-side list generation, ids shared across all records.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))
    }

    /// Drop a recipe but leave planned meals pointing at it.
    #[cfg(test)]
    pub(crate) fn forget_recipe(&self, id: i64) {
        if let Ok(mut inner) = self.lock() {
            inner.recipes.remove(&id);
        }
    }
}

impl RecipeStore for MemoryStore {
    fn list_recipes(&self) -> Result<Vec<Recipe>> {
        Ok(self.lock()?.recipes.values().cloned().collect())
    }

    fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        Ok(self.lock()?.recipes.get(&id).cloned())
    }

    fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        validate_new_recipe(recipe)?;
        let mut inner = self.lock()?;
        let id = inner.next_id();
        let created = Recipe {
            id,
            name: recipe.name.trim().to_string(),
            category: recipe.category.clone(),
            description: recipe.description.clone(),
            servings: recipe.servings,
            prep_time: recipe.prep_time,
            cook_time: recipe.cook_time,
            ingredients: recipe.ingredients.clone(),
            instructions: sorted_steps(&recipe.instructions),
        };
        inner.recipes.insert(id, created.clone());
        Ok(created)
    }

    fn update_recipe(&self, recipe: &Recipe) -> Result<bool> {
        validate_recipe(recipe)?;
        let mut inner = self.lock()?;
        let Some(stored) = inner.recipes.get_mut(&recipe.id) else {
            return Ok(false);
        };
        let ingredients = std::mem::take(&mut stored.ingredients);
        *stored = Recipe {
            name: recipe.name.trim().to_string(),
            ingredients,
            instructions: sorted_steps(&recipe.instructions),
            ..recipe.clone()
        };
        let name = stored.name.clone();
        for meal in inner.meals.values_mut().filter(|m| m.recipe_id == recipe.id) {
            meal.recipe_name.clone_from(&name);
        }
        Ok(true)
    }

    fn delete_recipe(&self, id: i64) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.recipes.remove(&id).is_none() {
            return Ok(false);
        }
        inner.meals.retain(|_, m| m.recipe_id != id);
        Ok(true)
    }

    fn list_instructions(&self, recipe_id: i64) -> Result<Vec<Instruction>> {
        let inner = self.lock()?;
        let recipe = inner
            .recipes
            .get(&recipe_id)
            .ok_or_else(|| anyhow!("Recipe {recipe_id} not found"))?;
        Ok(recipe.instructions.clone())
    }

    fn list_planned_meals(&self, range: DateRange) -> Result<Vec<PlannedMealRef>> {
        let inner = self.lock()?;
        let mut meals: Vec<PlannedMealRef> = inner
            .meals
            .values()
            .filter(|m| range.contains(m.date))
            .cloned()
            .collect();
        meals.sort_by_key(|m| (m.date, m.slot, m.id));
        Ok(meals)
    }

    fn add_planned_meal(&self, meal: &NewPlannedMeal) -> Result<()> {
        validate_new_planned_meal(meal)?;
        let mut inner = self.lock()?;
        let Some(recipe) = inner.recipes.get(&meal.recipe_id) else {
            bail!("Recipe {} not found", meal.recipe_id);
        };
        let recipe_name = recipe.name.clone();
        if inner
            .meals
            .values()
            .any(|m| m.date == meal.date && m.slot == meal.slot)
        {
            bail!("A {} is already planned for {}", meal.slot, meal.date);
        }
        let id = inner.next_id();
        inner.meals.insert(
            id,
            PlannedMealRef {
                id,
                date: meal.date,
                slot: meal.slot,
                recipe_id: meal.recipe_id,
                recipe_name,
                target_servings: meal.target_servings,
            },
        );
        Ok(())
    }

    fn update_planned_meal(&self, id: i64, update: &PlannedMealUpdate) -> Result<bool> {
        validate_planned_meal_update(update)?;
        let mut inner = self.lock()?;
        let Some(date) = inner.meals.get(&id).map(|m| m.date) else {
            return Ok(false);
        };
        let Some(recipe) = inner.recipes.get(&update.recipe_id) else {
            bail!("Recipe {} not found", update.recipe_id);
        };
        let recipe_name = recipe.name.clone();
        if inner
            .meals
            .values()
            .any(|m| m.id != id && m.date == date && m.slot == update.slot)
        {
            bail!("A {} is already planned for {date}", update.slot);
        }
        if let Some(meal) = inner.meals.get_mut(&id) {
            meal.recipe_id = update.recipe_id;
            meal.recipe_name = recipe_name;
            meal.slot = update.slot;
            meal.target_servings = update.target_servings;
        }
        Ok(true)
    }

    fn delete_planned_meal(&self, id: i64) -> Result<bool> {
        Ok(self.lock()?.meals.remove(&id).is_some())
    }

    fn generate_shopping_list(&self, range: DateRange) -> Result<ShoppingList> {
        let mut inner = self.lock()?;
        let mut meals = Vec::new();
        for m in inner.meals.values().filter(|m| range.contains(m.date)) {
            let recipe = inner
                .recipes
                .get(&m.recipe_id)
                .ok_or_else(|| anyhow!("Recipe {} not found", m.recipe_id))?;
            meals.push(m.clone().with_recipe(recipe.clone()));
        }

        let mut list = generate(&meals, range, None)?;
        for item in &mut list.items {
            item.id = inner.next_id();
        }
        let id = inner.next_id();
        list.id = Some(id);
        inner.lists.insert(id, list.clone());
        Ok(list)
    }

    fn get_shopping_list(&self, id: i64) -> Result<Option<ShoppingList>> {
        Ok(self.lock()?.lists.get(&id).cloned())
    }

    fn toggle_item(&self, item_id: i64) -> Result<()> {
        let mut inner = self.lock()?;
        let item = inner
            .lists
            .values_mut()
            .flat_map(|l| l.items.iter_mut())
            .find(|i| i.id == item_id)
            .ok_or(PlanError::ItemNotFound(item_id))?;
        item.checked = !item.checked;
        Ok(())
    }
}

fn sorted_steps(steps: &[Instruction]) -> Vec<Instruction> {
    let mut steps = steps.to_vec();
    steps.sort_by_key(|s| s.step_number);
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ingredient, MealSlot, number_steps};
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn soup() -> NewRecipe {
        NewRecipe {
            name: "Soup".to_string(),
            category: None,
            description: None,
            servings: 4,
            prep_time: None,
            cook_time: None,
            ingredients: vec![Ingredient::new("Onion", 2.0, "whole")],
            instructions: vec![],
        }
    }

    fn meal(recipe_id: i64, d: u32, slot: MealSlot) -> NewPlannedMeal {
        NewPlannedMeal {
            recipe_id,
            date: date(d),
            slot,
            target_servings: 2,
        }
    }

    #[test]
    fn test_recipe_crud() {
        let store = MemoryStore::new();
        let recipe = store.create_recipe(&soup()).unwrap();
        assert_eq!(store.get_recipe(recipe.id).unwrap(), Some(recipe.clone()));
        assert_eq!(store.list_recipes().unwrap().len(), 1);
        assert!(store.delete_recipe(recipe.id).unwrap());
        assert!(!store.delete_recipe(recipe.id).unwrap());
        assert!(store.get_recipe(recipe.id).unwrap().is_none());
    }

    #[test]
    fn test_update_recipe_keeps_ingredients() {
        let store = MemoryStore::new();
        let mut new = soup();
        new.instructions = number_steps(["Chop", "Simmer"]);
        let mut recipe = store.create_recipe(&new).unwrap();
        store.add_planned_meal(&meal(recipe.id, 12, MealSlot::Dinner)).unwrap();

        recipe.name = "Onion soup".to_string();
        recipe.ingredients.clear();
        recipe.instructions = number_steps(["Caramelise", "Simmer", "Serve"]);
        assert!(store.update_recipe(&recipe).unwrap());

        let stored = store.get_recipe(recipe.id).unwrap().unwrap();
        assert_eq!(stored.name, "Onion soup");
        assert_eq!(stored.ingredients, soup().ingredients);
        assert_eq!(store.list_instructions(recipe.id).unwrap().len(), 3);
        let meals = store.list_planned_meals(DateRange::single(date(12))).unwrap();
        assert_eq!(meals[0].recipe_name, "Onion soup");

        recipe.id = 999;
        assert!(!store.update_recipe(&recipe).unwrap());
        assert!(store.list_instructions(999).is_err());
    }

    #[test]
    fn test_update_planned_meal_respects_slots() {
        let store = MemoryStore::new();
        let id = store.create_recipe(&soup()).unwrap().id;
        store.add_planned_meal(&meal(id, 12, MealSlot::Dinner)).unwrap();
        store.add_planned_meal(&meal(id, 12, MealSlot::Lunch)).unwrap();
        let day = DateRange::single(date(12));
        let lunch_id = store.list_planned_meals(day).unwrap()[0].id;

        let clash = PlannedMealUpdate {
            recipe_id: id,
            slot: MealSlot::Dinner,
            target_servings: 3,
        };
        assert!(store.update_planned_meal(lunch_id, &clash).is_err());

        let snack = PlannedMealUpdate {
            slot: MealSlot::Snack,
            ..clash
        };
        assert!(store.update_planned_meal(lunch_id, &snack).unwrap());
        let meals = store.list_planned_meals(day).unwrap();
        let moved = meals.iter().find(|m| m.id == lunch_id).unwrap();
        assert_eq!(moved.slot, MealSlot::Snack);
        assert_eq!(moved.target_servings, 3);
        assert!(!store.update_planned_meal(9999, &snack).unwrap());
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let store = MemoryStore::new();
        let id = store.create_recipe(&soup()).unwrap().id;
        store.add_planned_meal(&meal(id, 11, MealSlot::Dinner)).unwrap();
        let err = store
            .add_planned_meal(&meal(id, 11, MealSlot::Dinner))
            .unwrap_err();
        assert!(err.to_string().contains("already planned"));
        store.add_planned_meal(&meal(id, 11, MealSlot::Lunch)).unwrap();
    }

    #[test]
    fn test_planned_meal_needs_recipe() {
        let store = MemoryStore::new();
        assert!(store.add_planned_meal(&meal(42, 11, MealSlot::Dinner)).is_err());
    }

    #[test]
    fn test_list_planned_meals_by_range() {
        let store = MemoryStore::new();
        let id = store.create_recipe(&soup()).unwrap().id;
        store.add_planned_meal(&meal(id, 9, MealSlot::Dinner)).unwrap();
        store.add_planned_meal(&meal(id, 12, MealSlot::Dinner)).unwrap();
        store.add_planned_meal(&meal(id, 10, MealSlot::Lunch)).unwrap();

        let range = DateRange::new(date(10), date(16)).unwrap();
        let meals = store.list_planned_meals(range).unwrap();
        let dates: Vec<NaiveDate> = meals.iter().map(|m| m.date).collect();
        assert_eq!(dates, vec![date(10), date(12)]);
        assert_eq!(meals[0].recipe_name, "Soup");
    }

    #[test]
    fn test_delete_recipe_removes_its_meals() {
        let store = MemoryStore::new();
        let id = store.create_recipe(&soup()).unwrap().id;
        store.add_planned_meal(&meal(id, 12, MealSlot::Dinner)).unwrap();
        store.delete_recipe(id).unwrap();
        let range = DateRange::single(date(12));
        assert!(store.list_planned_meals(range).unwrap().is_empty());
    }

    #[test]
    fn test_generate_and_toggle() {
        let store = MemoryStore::new();
        let id = store.create_recipe(&soup()).unwrap().id;
        store.add_planned_meal(&meal(id, 12, MealSlot::Dinner)).unwrap();

        let range = DateRange::new(date(10), date(16)).unwrap();
        let list = store.generate_shopping_list(range).unwrap();
        assert!(list.id.is_some());
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].quantity, 1.0);

        store.toggle_item(list.items[0].id).unwrap();
        let stored = store.get_shopping_list(list.id.unwrap()).unwrap().unwrap();
        assert!(stored.items[0].checked);

        let err = store.toggle_item(9999).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PlanError>(),
            Some(&PlanError::ItemNotFound(9999))
        );
    }
}
