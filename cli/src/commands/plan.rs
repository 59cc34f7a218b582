use anyhow::{Result, bail};
use tabled::{Table, Tabled, settings::Style};

use pantry_core::models::{MealSlot, NewPlannedMeal, PlannedMealChanges};
use pantry_core::week::WeekPlan;

use super::Service;
use super::helpers::{exit_not_found, parse_date, truncate};

pub(crate) fn cmd_plan_week(
    svc: &Service,
    date: Option<String>,
    offset: i64,
    json: bool,
) -> Result<()> {
    let anchor = parse_date(date)?;
    let week = svc.week_plan(anchor, offset)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&week)?);
    } else {
        print_week(&week);
    }
    Ok(())
}

fn print_week(week: &WeekPlan) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Meal")]
        slot: String,
        #[tabled(rename = "Recipe")]
        recipe: String,
        #[tabled(rename = "Servings")]
        servings: u32,
    }

    println!(
        "Week of {} to {} ({} meals)",
        week.start.format("%a %Y-%m-%d"),
        week.end.format("%a %Y-%m-%d"),
        week.meal_count()
    );
    for day in &week.days {
        println!("\n{}", day.date.format("%A %Y-%m-%d"));
        if day.meals.is_empty() {
            println!("  (nothing planned)");
            continue;
        }
        let rows: Vec<MealRow> = day
            .meals
            .iter()
            .map(|m| MealRow {
                id: m.id,
                slot: m.slot.to_string(),
                recipe: truncate(&m.recipe.name, 30),
                servings: m.target_servings,
            })
            .collect();
        println!("{}", Table::new(&rows).with(Style::rounded()));
    }
}

pub(crate) fn cmd_plan_add(
    svc: &Service,
    recipe_id: i64,
    date: Option<String>,
    meal: &str,
    servings: Option<u32>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let slot: MealSlot = meal.parse()?;
    let target_servings = match servings {
        Some(n) => n,
        None => match svc.get_recipe(recipe_id)? {
            Some(recipe) => recipe.servings,
            None => exit_not_found(&format!("Recipe {recipe_id} not found"), json),
        },
    };

    let meal = NewPlannedMeal {
        recipe_id,
        date,
        slot,
        target_servings,
    };
    svc.add_planned_meal(&meal)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        println!("Planned recipe {recipe_id} for {slot} on {date} ({target_servings} servings)");
    }
    Ok(())
}

/// Change a planned meal. The backend lists meals by date only, so the
/// meal's date is needed to find it.
pub(crate) fn cmd_plan_edit(
    svc: &Service,
    id: i64,
    date: Option<String>,
    changes: PlannedMealChanges,
    json: bool,
) -> Result<()> {
    if changes.is_empty() {
        bail!("Nothing to change. Pass --recipe, --meal or --servings");
    }
    let date = parse_date(date)?;
    let Some(meal) = svc.update_planned_meal(id, date, &changes)? else {
        exit_not_found(&format!("No planned meal {id} on {date}"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        println!(
            "Updated planned meal {id}: {} for {} on {date} ({} servings)",
            meal.recipe_name, meal.slot, meal.target_servings
        );
    }
    Ok(())
}

/// Parse the `--meal` option of `plan edit`.
pub(crate) fn parse_slot(meal: Option<&str>) -> Result<Option<MealSlot>> {
    Ok(meal.map(str::parse::<MealSlot>).transpose()?)
}

pub(crate) fn cmd_plan_delete(svc: &Service, id: i64, json: bool) -> Result<()> {
    if !svc.delete_planned_meal(id)? {
        exit_not_found(&format!("Planned meal {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Removed planned meal {id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slot() {
        assert_eq!(parse_slot(None).unwrap(), None);
        assert_eq!(parse_slot(Some("Lunch")).unwrap(), Some(MealSlot::Lunch));
        assert!(parse_slot(Some("brunch")).is_err());
    }
}
