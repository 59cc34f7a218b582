use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::models::{Recipe, ScaledIngredient, ScaledRecipe};

/// Fractional digits shown for original and scaled quantities alike.
pub const DISPLAY_DECIMALS: usize = 1;

/// What a zero "desired servings" input means at the input boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroTargetPolicy {
    /// Show the recipe as written (ratio 1).
    #[default]
    Fallback,
    /// Treat zero as out of range.
    Reject,
}

impl FromStr for ZeroTargetPolicy {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fallback" => Ok(Self::Fallback),
            "reject" => Ok(Self::Reject),
            other => Err(PlanError::payload(format!(
                "Invalid zero-target policy '{other}'. Must be one of: fallback, reject"
            ))),
        }
    }
}

/// `target / recipe.servings`. Never divides by zero.
pub fn ratio(recipe: &Recipe, target: u32) -> Result<f64, PlanError> {
    if recipe.servings == 0 {
        return Err(PlanError::InvalidRecipe {
            name: recipe.name.clone(),
            servings: 0,
        });
    }
    if target == 0 {
        return Err(PlanError::OutOfRangeServings(0));
    }
    Ok(f64::from(target) / f64::from(recipe.servings))
}

/// Scale every ingredient of `recipe` to `target` servings, preserving order.
///
/// Always computed from the recipe as written, so repeated calls with
/// different targets never accumulate error.
pub fn scale(recipe: &Recipe, target: u32) -> Result<Vec<ScaledIngredient>, PlanError> {
    let ratio = ratio(recipe, target)?;
    Ok(recipe
        .ingredients
        .iter()
        .map(|ing| ScaledIngredient {
            name: ing.name.clone(),
            unit: ing.unit.clone(),
            quantity: ing.quantity,
            scaled_quantity: ing.quantity * ratio,
        })
        .collect())
}

pub fn scale_recipe(recipe: &Recipe, target: u32) -> Result<ScaledRecipe, PlanError> {
    Ok(ScaledRecipe {
        recipe_id: recipe.id,
        name: recipe.name.clone(),
        original_servings: recipe.servings,
        scaled_servings: target,
        ingredients: scale(recipe, target)?,
    })
}

/// Turn raw user input into a target serving count.
///
/// Unset input means the recipe's own servings. Negative input is always
/// rejected; zero follows `policy`.
pub fn resolve_target(
    raw: Option<i64>,
    recipe: &Recipe,
    policy: ZeroTargetPolicy,
) -> Result<u32, PlanError> {
    match raw {
        None => Ok(recipe.servings),
        Some(n) if n < 0 => Err(PlanError::OutOfRangeServings(n)),
        Some(0) => match policy {
            ZeroTargetPolicy::Fallback => Ok(recipe.servings),
            ZeroTargetPolicy::Reject => Err(PlanError::OutOfRangeServings(0)),
        },
        Some(n) => u32::try_from(n).map_err(|_| PlanError::OutOfRangeServings(n)),
    }
}

#[must_use]
pub fn round_display(quantity: f64) -> f64 {
    let factor = 10_f64.powi(DISPLAY_DECIMALS as i32);
    let rounded = (quantity * factor).round() / factor;
    // -0.0 prints as "-0"
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Render a quantity with the display precision, dropping a trailing `.0`.
#[must_use]
pub fn format_quantity(quantity: f64) -> String {
    let s = format!("{:.*}", DISPLAY_DECIMALS, round_display(quantity));
    match s.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => s,
    }
}

impl ScaledIngredient {
    #[must_use]
    pub fn display_quantity(&self) -> f64 {
        round_display(self.quantity)
    }

    #[must_use]
    pub fn display_scaled(&self) -> f64 {
        round_display(self.scaled_quantity)
    }
}
