use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::PlanError;
use crate::models::{DateRange, PlannedMeal, ShoppingList, ShoppingListItem};
use crate::scale::scale;

/// One summed `(name, unit)` group before it becomes a list item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedLine {
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    /// How many scaled ingredients were summed into this line.
    pub contributions: usize,
}

impl ShoppingListItem {
    /// Aggregation key: exact, case-sensitive `(name, unit)`.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (self.name.as_str(), self.unit.as_str())
    }

    #[must_use]
    pub fn toggled(&self) -> Self {
        Self {
            checked: !self.checked,
            ..self.clone()
        }
    }
}

/// Scale every meal dated inside `range` and sum quantities per `(name, unit)`.
///
/// Lines come back ordered by key. The per-line sum is taken over
/// contributions sorted by value, so the result does not depend on the
/// order of `meals`.
pub fn aggregate(
    meals: &[PlannedMeal],
    range: DateRange,
) -> Result<Vec<AggregatedLine>, PlanError> {
    let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();

    for meal in meals.iter().filter(|m| range.contains(m.date)) {
        for scaled in scale(&meal.recipe, meal.target_servings)? {
            groups
                .entry((scaled.name, scaled.unit))
                .or_default()
                .push(scaled.scaled_quantity);
        }
    }

    Ok(groups
        .into_iter()
        .map(|((name, unit), mut parts)| {
            parts.sort_by(f64::total_cmp);
            AggregatedLine {
                name,
                unit,
                quantity: parts.iter().sum(),
                contributions: parts.len(),
            }
        })
        .collect())
}

/// Build a shopping list for `range` from planned meals.
///
/// Items whose key was present in `previous` keep their id and checked flag;
/// new keys start unchecked with ids above the previous maximum. The result
/// is a local list (`id == None`).
pub fn generate(
    meals: &[PlannedMeal],
    range: DateRange,
    previous: Option<&ShoppingList>,
) -> Result<ShoppingList, PlanError> {
    let lines = aggregate(meals, range)?;

    let prior: HashMap<(&str, &str), &ShoppingListItem> = previous
        .map(|p| p.items.iter().map(|i| (i.key(), i)).collect())
        .unwrap_or_default();
    let mut next_id = previous
        .and_then(|p| p.items.iter().map(|i| i.id).max())
        .unwrap_or(0);

    let items = lines
        .into_iter()
        .map(|line| {
            let key = (line.name.as_str(), line.unit.as_str());
            let (id, checked) = if let Some(old) = prior.get(&key) {
                (old.id, old.checked)
            } else {
                next_id += 1;
                (next_id, false)
            };
            ShoppingListItem {
                id,
                name: line.name,
                unit: line.unit,
                quantity: line.quantity,
                checked,
            }
        })
        .collect();

    Ok(ShoppingList {
        id: None,
        start_date: range.start(),
        end_date: range.end(),
        items,
    })
}

/// Copy checked flags from `previous` onto matching keys of `fresh`.
///
/// Returns the ids of items in `fresh` whose flag changed, so a caller
/// holding a remote list can push those toggles back.
pub fn merge_checked(fresh: &mut ShoppingList, previous: Option<&ShoppingList>) -> Vec<i64> {
    let Some(previous) = previous else {
        return Vec::new();
    };
    let prior: HashMap<(&str, &str), bool> = previous
        .items
        .iter()
        .map(|i| (i.key(), i.checked))
        .collect();

    let mut changed = Vec::new();
    for item in &mut fresh.items {
        if let Some(&checked) = prior.get(&item.key()) {
            if item.checked != checked {
                item.checked = checked;
                changed.push(item.id);
            }
        }
    }
    changed
}

/// Flip `checked` on one item. Quantity and unit are untouched.
pub fn toggle(list: &mut ShoppingList, item_id: i64) -> Result<&ShoppingListItem, PlanError> {
    let item = list
        .items
        .iter_mut()
        .find(|i| i.id == item_id)
        .ok_or(PlanError::ItemNotFound(item_id))?;
    item.checked = !item.checked;
    Ok(item)
}
