//! JSON shapes exchanged with the recipe backend, and their conversion into
//! validated domain values. Conversion rejects anything that does not match
//! the one canonical schema.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::models::{
    DateRange, Ingredient, Instruction, MealSlot, NewPlannedMeal, NewRecipe, PlannedMealRef,
    PlannedMealUpdate, Recipe, ShoppingList, ShoppingListItem, validate_ingredient,
    validate_instruction,
};
use crate::session::User;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientPayload {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

/// Recipe as returned by `/recipes` (summary, no ingredients) and
/// `/recipes/{id}` (full).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipePayload {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub servings: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub prep_time: Option<i64>,
    #[serde(default)]
    pub cook_time: Option<i64>,
    #[serde(default)]
    pub ingredients: Vec<IngredientPayload>,
    /// `null` when the recipe has no steps.
    #[serde(default)]
    pub instructions: Option<Vec<InstructionPayload>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionPayload {
    pub id: i64,
    pub step_number: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeRefPayload {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealPlanPayload {
    pub id: i64,
    pub date: String,
    pub meal_type: String,
    pub target_servings: i64,
    pub recipe: RecipeRefPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingListItemPayload {
    pub id: i64,
    #[serde(default)]
    pub ingredient_id: Option<i64>,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingListPayload {
    pub id: i64,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub items: Vec<ShoppingListItemPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// `{"id": ...}` body returned on create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPayload {
    pub id: i64,
}

/// Entry of the shared ingredient catalogue (`/ingredients`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientEntryPayload {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipeRequest {
    pub name: String,
    pub description: String,
    pub servings: u32,
    pub prep_time: u32,
    pub cook_time: u32,
    pub category: String,
}

/// `PUT /recipes/{id}` takes the same fields as create.
pub type UpdateRecipeRequest = CreateRecipeRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionRequest {
    pub step_number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIngredientRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRecipeIngredientRequest {
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMealPlanRequest {
    pub recipe_id: i64,
    pub date: String,
    pub meal_type: String,
    pub target_servings: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMealPlanRequest {
    pub recipe_id: i64,
    pub meal_type: String,
    pub target_servings: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateListRequest {
    pub start_date: String,
    pub end_date: String,
}

pub fn parse_wire_date(s: &str) -> Result<NaiveDate, PlanError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| PlanError::payload(format!("Invalid date '{s}', expected YYYY-MM-DD")))
}

#[must_use]
pub fn format_wire_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn minutes(field: &str, value: Option<i64>) -> Result<Option<u32>, PlanError> {
    match value {
        None => Ok(None),
        Some(m) => u32::try_from(m)
            .map(Some)
            .map_err(|_| PlanError::payload(format!("Invalid {field} {m}; must be >= 0"))),
    }
}

pub fn ingredient_from_payload(p: IngredientPayload) -> Result<Ingredient, PlanError> {
    let ingredient = Ingredient::new(p.name.trim(), p.quantity, p.unit.trim());
    validate_ingredient(&ingredient)?;
    Ok(ingredient)
}

pub fn instruction_from_payload(p: InstructionPayload) -> Result<Instruction, PlanError> {
    let step_number = u32::try_from(p.step_number).map_err(|_| {
        PlanError::payload(format!("Invalid step number {}", p.step_number))
    })?;
    let step = Instruction {
        step_number,
        text: p.text.trim().to_string(),
    };
    validate_instruction(&step)?;
    Ok(step)
}

/// Steps in cooking order.
pub fn instructions_from_payload(
    payload: Option<Vec<InstructionPayload>>,
) -> Result<Vec<Instruction>, PlanError> {
    let mut steps = payload
        .unwrap_or_default()
        .into_iter()
        .map(instruction_from_payload)
        .collect::<Result<Vec<_>, _>>()?;
    steps.sort_by_key(|s| s.step_number);
    Ok(steps)
}

pub fn recipe_from_payload(p: RecipePayload) -> Result<Recipe, PlanError> {
    let name = p.name.trim().to_string();
    if name.is_empty() {
        return Err(PlanError::payload(format!(
            "Recipe {} has an empty name",
            p.id
        )));
    }
    let servings = match u32::try_from(p.servings) {
        Ok(s) if s > 0 => s,
        _ => {
            return Err(PlanError::InvalidRecipe {
                name,
                servings: p.servings,
            });
        }
    };
    let ingredients = p
        .ingredients
        .into_iter()
        .map(ingredient_from_payload)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Recipe {
        id: p.id,
        name,
        category: non_empty(p.category),
        description: non_empty(p.description),
        servings,
        prep_time: minutes("prep_time", p.prep_time)?,
        cook_time: minutes("cook_time", p.cook_time)?,
        ingredients,
        instructions: instructions_from_payload(p.instructions)?,
    })
}

pub fn planned_meal_from_payload(p: MealPlanPayload) -> Result<PlannedMealRef, PlanError> {
    let target_servings = match u32::try_from(p.target_servings) {
        Ok(s) if s > 0 => s,
        _ => return Err(PlanError::OutOfRangeServings(p.target_servings)),
    };
    Ok(PlannedMealRef {
        id: p.id,
        date: parse_wire_date(&p.date)?,
        slot: p.meal_type.parse::<MealSlot>()?,
        recipe_id: p.recipe.id,
        recipe_name: p.recipe.name,
        target_servings,
    })
}

pub fn shopping_item_from_payload(
    p: ShoppingListItemPayload,
) -> Result<ShoppingListItem, PlanError> {
    let ingredient = ingredient_from_payload(IngredientPayload {
        name: p.name,
        quantity: p.quantity,
        unit: p.unit,
    })?;
    Ok(ShoppingListItem {
        id: p.id,
        name: ingredient.name,
        unit: ingredient.unit,
        quantity: ingredient.quantity,
        checked: p.checked,
    })
}

pub fn shopping_list_from_payload(p: ShoppingListPayload) -> Result<ShoppingList, PlanError> {
    let range = DateRange::new(
        parse_wire_date(&p.start_date)?,
        parse_wire_date(&p.end_date)?,
    )?;
    let items = p
        .items
        .into_iter()
        .map(shopping_item_from_payload)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ShoppingList {
        id: Some(p.id),
        start_date: range.start(),
        end_date: range.end(),
        items,
    })
}

pub fn user_from_payload(p: ProfilePayload) -> Result<User, PlanError> {
    if p.email.trim().is_empty() {
        return Err(PlanError::payload("Profile has an empty email"));
    }
    Ok(User {
        id: p.id,
        name: p.name,
        email: p.email,
    })
}

#[must_use]
pub fn recipe_request(recipe: &NewRecipe) -> CreateRecipeRequest {
    CreateRecipeRequest {
        name: recipe.name.clone(),
        description: recipe.description.clone().unwrap_or_default(),
        servings: recipe.servings,
        prep_time: recipe.prep_time.unwrap_or(0),
        cook_time: recipe.cook_time.unwrap_or(0),
        category: recipe.category.clone().unwrap_or_default(),
    }
}

#[must_use]
pub fn recipe_update_request(recipe: &Recipe) -> UpdateRecipeRequest {
    UpdateRecipeRequest {
        name: recipe.name.clone(),
        description: recipe.description.clone().unwrap_or_default(),
        servings: recipe.servings,
        prep_time: recipe.prep_time.unwrap_or(0),
        cook_time: recipe.cook_time.unwrap_or(0),
        category: recipe.category.clone().unwrap_or_default(),
    }
}

#[must_use]
pub fn instruction_request(step: &Instruction) -> InstructionRequest {
    InstructionRequest {
        step_number: step.step_number,
        text: step.text.clone(),
    }
}

#[must_use]
pub fn meal_plan_update_request(update: &PlannedMealUpdate) -> UpdateMealPlanRequest {
    UpdateMealPlanRequest {
        recipe_id: update.recipe_id,
        meal_type: update.slot.as_str().to_string(),
        target_servings: update.target_servings,
    }
}

#[must_use]
pub fn meal_plan_request(meal: &NewPlannedMeal) -> CreateMealPlanRequest {
    CreateMealPlanRequest {
        recipe_id: meal.recipe_id,
        date: format_wire_date(meal.date),
        meal_type: meal.slot.as_str().to_string(),
        target_servings: meal.target_servings,
    }
}

#[must_use]
pub fn generate_request(range: DateRange) -> GenerateListRequest {
    GenerateListRequest {
        start_date: format_wire_date(range.start()),
        end_date: format_wire_date(range.end()),
    }
}
