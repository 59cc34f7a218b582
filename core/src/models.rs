use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
        }
    }
}

/// One preparation step. Steps are numbered from 1 in cooking order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub step_number: u32,
    pub text: String,
}

/// Number `steps` by position, skipping blank lines.
pub fn number_steps<I>(steps: I) -> Vec<Instruction>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    steps
        .into_iter()
        .filter_map(|s| {
            let text = s.as_ref().trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .zip(1..)
        .map(|(text, step_number)| Instruction { step_number, text })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base serving count the ingredient quantities are written for.
    pub servings: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<u32>,
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl Recipe {
    /// Prep plus cook time in minutes, if either is known.
    #[must_use]
    pub fn total_time(&self) -> Option<u32> {
        match (self.prep_time, self.cook_time) {
            (None, None) => None,
            (p, c) => Some(p.unwrap_or(0) + c.unwrap_or(0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub servings: u32,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

/// Changes to a stored recipe. `None` leaves the field as it is; an empty
/// string clears the optional text fields. Ingredients are not editable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub servings: Option<u32>,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    /// Replaces every step when set.
    pub instructions: Option<Vec<Instruction>>,
}

impl RecipeUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `recipe` with these changes applied.
    #[must_use]
    pub fn apply(&self, recipe: &Recipe) -> Recipe {
        Recipe {
            id: recipe.id,
            name: self
                .name
                .as_deref()
                .map_or_else(|| recipe.name.clone(), |n| n.trim().to_string()),
            category: edit_text(self.category.as_deref(), recipe.category.as_deref()),
            description: edit_text(self.description.as_deref(), recipe.description.as_deref()),
            servings: self.servings.unwrap_or(recipe.servings),
            prep_time: self.prep_time.or(recipe.prep_time),
            cook_time: self.cook_time.or(recipe.cook_time),
            ingredients: recipe.ingredients.clone(),
            instructions: self
                .instructions
                .clone()
                .unwrap_or_else(|| recipe.instructions.clone()),
        }
    }
}

fn edit_text(new: Option<&str>, old: Option<&str>) -> Option<String> {
    match new {
        Some(v) => Some(v.trim().to_string()).filter(|v| !v.is_empty()),
        None => old.map(String::from),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

pub const MEAL_SLOTS: [MealSlot; 4] = [
    MealSlot::Breakfast,
    MealSlot::Lunch,
    MealSlot::Dinner,
    MealSlot::Snack,
];

impl MealSlot {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealSlot {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        MEAL_SLOTS
            .into_iter()
            .find(|slot| slot.as_str() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = MEAL_SLOTS.iter().map(|m| m.as_str()).collect();
                PlanError::payload(format!(
                    "Invalid meal type '{s}'. Must be one of: {}",
                    names.join(", ")
                ))
            })
    }
}

/// A recipe placed on a date and slot with its own serving count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMeal {
    pub id: i64,
    pub date: NaiveDate,
    pub slot: MealSlot,
    pub recipe: Recipe,
    pub target_servings: u32,
}

/// Planner row as the backend returns it: the recipe is referenced, not embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMealRef {
    pub id: i64,
    pub date: NaiveDate,
    pub slot: MealSlot,
    pub recipe_id: i64,
    pub recipe_name: String,
    pub target_servings: u32,
}

impl PlannedMealRef {
    #[must_use]
    pub fn with_recipe(self, recipe: Recipe) -> PlannedMeal {
        PlannedMeal {
            id: self.id,
            date: self.date,
            slot: self.slot,
            recipe,
            target_servings: self.target_servings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlannedMeal {
    pub recipe_id: i64,
    pub date: NaiveDate,
    pub slot: MealSlot,
    pub target_servings: u32,
}

/// Partial edit of a planned meal; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMealChanges {
    pub recipe_id: Option<i64>,
    pub slot: Option<MealSlot>,
    pub target_servings: Option<u32>,
}

impl PlannedMealChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn apply(&self, current: &PlannedMealRef) -> PlannedMealUpdate {
        PlannedMealUpdate {
            recipe_id: self.recipe_id.unwrap_or(current.recipe_id),
            slot: self.slot.unwrap_or(current.slot),
            target_servings: self.target_servings.unwrap_or(current.target_servings),
        }
    }
}

/// Full replacement values for a planned meal. The date never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMealUpdate {
    pub recipe_id: i64,
    pub slot: MealSlot,
    pub target_servings: u32,
}

/// Inclusive `[start, end]` span of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PlanError> {
        if end < start {
            return Err(PlanError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub(crate) fn from_ordered(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    #[must_use]
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// True when the two ranges share at least one day.
    #[must_use]
    pub fn overlaps(&self, other: DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    #[must_use]
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledIngredient {
    pub name: String,
    pub unit: String,
    /// Quantity as written in the recipe.
    pub quantity: f64,
    /// Quantity for the requested servings, unrounded.
    pub scaled_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledRecipe {
    pub recipe_id: i64,
    pub name: String,
    pub original_servings: u32,
    pub scaled_servings: u32,
    pub ingredients: Vec<ScaledIngredient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingListItem {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    /// `None` until the list has been stored remotely.
    pub id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    #[must_use]
    pub fn range(&self) -> Option<DateRange> {
        DateRange::new(self.start_date, self.end_date).ok()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.items.iter().filter(|i| !i.checked).count()
    }
}

pub fn validate_ingredient(ingredient: &Ingredient) -> Result<(), PlanError> {
    if ingredient.name.trim().is_empty() {
        return Err(PlanError::payload("Ingredient name must not be empty"));
    }
    if !ingredient.quantity.is_finite() || ingredient.quantity < 0.0 {
        return Err(PlanError::payload(format!(
            "Ingredient '{}' has invalid quantity {}; must be a non-negative number",
            ingredient.name, ingredient.quantity
        )));
    }
    Ok(())
}

/// Validate a recipe's name, base servings, ingredients and steps.
pub fn validate_recipe(recipe: &Recipe) -> Result<(), PlanError> {
    check_recipe_fields(&recipe.name, recipe.servings, &recipe.ingredients)?;
    recipe.instructions.iter().try_for_each(validate_instruction)
}

pub fn validate_new_recipe(recipe: &NewRecipe) -> Result<(), PlanError> {
    check_recipe_fields(&recipe.name, recipe.servings, &recipe.ingredients)?;
    recipe.instructions.iter().try_for_each(validate_instruction)
}

fn check_recipe_fields(
    name: &str,
    servings: u32,
    ingredients: &[Ingredient],
) -> Result<(), PlanError> {
    if name.trim().is_empty() {
        return Err(PlanError::payload("Recipe name must not be empty"));
    }
    if servings == 0 {
        return Err(PlanError::InvalidRecipe {
            name: name.to_string(),
            servings: 0,
        });
    }
    ingredients.iter().try_for_each(validate_ingredient)
}

pub fn validate_instruction(step: &Instruction) -> Result<(), PlanError> {
    if step.step_number == 0 {
        return Err(PlanError::payload("Step numbers start at 1"));
    }
    if step.text.trim().is_empty() {
        return Err(PlanError::payload(format!(
            "Step {} has no text",
            step.step_number
        )));
    }
    Ok(())
}

pub fn validate_new_planned_meal(meal: &NewPlannedMeal) -> Result<(), PlanError> {
    check_target_servings(meal.target_servings)
}

pub fn validate_planned_meal_update(update: &PlannedMealUpdate) -> Result<(), PlanError> {
    check_target_servings(update.target_servings)
}

fn check_target_servings(target: u32) -> Result<(), PlanError> {
    if target == 0 {
        return Err(PlanError::OutOfRangeServings(0));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pasta() -> Recipe {
        Recipe {
            id: 1,
            name: "Pasta".to_string(),
            category: None,
            description: None,
            servings: 2,
            prep_time: Some(10),
            cook_time: Some(15),
            ingredients: vec![
                Ingredient::new("Pasta", 200.0, "g"),
                Ingredient::new("Salt", 1.0, "tsp"),
            ],
            instructions: number_steps(["Boil water", "Cook pasta"]),
        }
    }

    #[test]
    fn test_meal_slot_parse() {
        assert_eq!("breakfast".parse::<MealSlot>().unwrap(), MealSlot::Breakfast);
        assert_eq!("lunch".parse::<MealSlot>().unwrap(), MealSlot::Lunch);
        assert_eq!("dinner".parse::<MealSlot>().unwrap(), MealSlot::Dinner);
        assert_eq!("snack".parse::<MealSlot>().unwrap(), MealSlot::Snack);
    }

    #[test]
    fn test_meal_slot_case_insensitive() {
        assert_eq!("Lunch".parse::<MealSlot>().unwrap(), MealSlot::Lunch);
        assert_eq!("BREAKFAST".parse::<MealSlot>().unwrap(), MealSlot::Breakfast);
    }

    #[test]
    fn test_meal_slot_invalid() {
        assert!("brunch".parse::<MealSlot>().is_err());
        assert!("".parse::<MealSlot>().is_err());
    }

    #[test]
    fn test_meal_slot_serde_lowercase() {
        let json = serde_json::to_string(&MealSlot::Dinner).unwrap();
        assert_eq!(json, "\"dinner\"");
        let slot: MealSlot = serde_json::from_str("\"snack\"").unwrap();
        assert_eq!(slot, MealSlot::Snack);
    }

    #[test]
    fn test_date_range_inclusive() {
        let range = DateRange::new(date(2024, 6, 10), date(2024, 6, 16)).unwrap();
        assert!(range.contains(date(2024, 6, 10)));
        assert!(range.contains(date(2024, 6, 16)));
        assert!(!range.contains(date(2024, 6, 9)));
        assert!(!range.contains(date(2024, 6, 17)));
        assert_eq!(range.num_days(), 7);
    }

    #[test]
    fn test_date_range_rejects_reversed() {
        let err = DateRange::new(date(2024, 6, 16), date(2024, 6, 10)).unwrap_err();
        assert!(matches!(err, PlanError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_date_range_overlaps() {
        let week = DateRange::new(date(2024, 6, 10), date(2024, 6, 16)).unwrap();
        let tail = DateRange::new(date(2024, 6, 16), date(2024, 6, 20)).unwrap();
        let next = DateRange::new(date(2024, 6, 17), date(2024, 6, 23)).unwrap();
        assert!(week.overlaps(tail));
        assert!(tail.overlaps(week));
        assert!(week.overlaps(DateRange::single(date(2024, 6, 12))));
        assert!(!week.overlaps(next));
    }

    #[test]
    fn test_date_range_single_day() {
        let range = DateRange::single(date(2024, 2, 29));
        assert_eq!(range.num_days(), 1);
        assert!(range.contains(date(2024, 2, 29)));
    }

    #[test]
    fn test_total_time() {
        let mut recipe = pasta();
        assert_eq!(recipe.total_time(), Some(25));
        recipe.cook_time = None;
        assert_eq!(recipe.total_time(), Some(10));
        recipe.prep_time = None;
        assert_eq!(recipe.total_time(), None);
    }

    #[test]
    fn test_validate_recipe_valid() {
        assert!(validate_recipe(&pasta()).is_ok());
    }

    #[test]
    fn test_validate_recipe_zero_servings() {
        let mut recipe = pasta();
        recipe.servings = 0;
        assert_eq!(
            validate_recipe(&recipe).unwrap_err(),
            PlanError::InvalidRecipe {
                name: "Pasta".to_string(),
                servings: 0
            }
        );
    }

    #[test]
    fn test_validate_recipe_empty_name() {
        let mut recipe = pasta();
        recipe.name = "  ".to_string();
        assert!(validate_recipe(&recipe).is_err());
    }

    #[test]
    fn test_validate_ingredient_negative_quantity() {
        assert!(validate_ingredient(&Ingredient::new("Salt", -1.0, "tsp")).is_err());
        assert!(validate_ingredient(&Ingredient::new("Salt", f64::NAN, "tsp")).is_err());
        assert!(validate_ingredient(&Ingredient::new("Water", 0.0, "ml")).is_ok());
    }

    #[test]
    fn test_validate_new_planned_meal_zero_servings() {
        let meal = NewPlannedMeal {
            recipe_id: 1,
            date: date(2024, 6, 10),
            slot: MealSlot::Dinner,
            target_servings: 0,
        };
        assert_eq!(
            validate_new_planned_meal(&meal).unwrap_err(),
            PlanError::OutOfRangeServings(0)
        );
    }

    #[test]
    fn test_number_steps_skips_blank_lines() {
        let steps = number_steps(["Chop onions", "  ", " Fry them "]);
        assert_eq!(
            steps,
            vec![
                Instruction {
                    step_number: 1,
                    text: "Chop onions".to_string()
                },
                Instruction {
                    step_number: 2,
                    text: "Fry them".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_validate_recipe_blank_step() {
        let mut recipe = pasta();
        recipe.instructions[1].text = " ".to_string();
        assert!(validate_recipe(&recipe).is_err());
        recipe.instructions[1].text = "Drain".to_string();
        recipe.instructions[1].step_number = 0;
        assert!(validate_recipe(&recipe).is_err());
    }

    #[test]
    fn test_recipe_without_instructions_deserializes() {
        let recipe: Recipe = serde_json::from_str(
            r#"{"id": 1, "name": "Toast", "servings": 1, "ingredients": []}"#,
        )
        .unwrap();
        assert!(recipe.instructions.is_empty());
    }

    #[test]
    fn test_recipe_update_apply() {
        let recipe = pasta();
        let update = RecipeUpdate {
            name: Some(" Pasta al limone ".to_string()),
            category: Some(String::new()),
            servings: Some(4),
            instructions: Some(number_steps(["Zest the lemon"])),
            ..RecipeUpdate::default()
        };
        let updated = update.apply(&recipe);
        assert_eq!(updated.id, recipe.id);
        assert_eq!(updated.name, "Pasta al limone");
        assert!(updated.category.is_none());
        assert_eq!(updated.servings, 4);
        assert_eq!(updated.prep_time, Some(10));
        assert_eq!(updated.ingredients, recipe.ingredients);
        assert_eq!(updated.instructions.len(), 1);

        assert!(RecipeUpdate::default().is_empty());
        assert_eq!(RecipeUpdate::default().apply(&recipe), recipe);
    }

    #[test]
    fn test_planned_meal_changes_apply() {
        let current = PlannedMealRef {
            id: 7,
            date: date(2024, 6, 12),
            slot: MealSlot::Dinner,
            recipe_id: 1,
            recipe_name: "Pasta".to_string(),
            target_servings: 2,
        };
        let changes = PlannedMealChanges {
            slot: Some(MealSlot::Lunch),
            target_servings: Some(6),
            ..PlannedMealChanges::default()
        };
        assert_eq!(
            changes.apply(&current),
            PlannedMealUpdate {
                recipe_id: 1,
                slot: MealSlot::Lunch,
                target_servings: 6
            }
        );
        let zero = PlannedMealChanges {
            target_servings: Some(0),
            ..PlannedMealChanges::default()
        };
        assert_eq!(
            validate_planned_meal_update(&zero.apply(&current)).unwrap_err(),
            PlanError::OutOfRangeServings(0)
        );
    }

    #[test]
    fn test_shopping_list_remaining() {
        let list = ShoppingList {
            id: None,
            start_date: date(2024, 6, 10),
            end_date: date(2024, 6, 16),
            items: vec![
                ShoppingListItem {
                    id: 1,
                    name: "Pasta".to_string(),
                    unit: "g".to_string(),
                    quantity: 600.0,
                    checked: true,
                },
                ShoppingListItem {
                    id: 2,
                    name: "Salt".to_string(),
                    unit: "tsp".to_string(),
                    quantity: 3.0,
                    checked: false,
                },
            ],
        };
        assert_eq!(list.remaining(), 1);
        assert_eq!(list.range().unwrap().num_days(), 7);
    }
}
