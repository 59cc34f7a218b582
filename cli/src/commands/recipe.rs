use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use pantry_core::models::{Ingredient, Instruction, NewRecipe, Recipe, RecipeUpdate, number_steps};
use pantry_core::scale::format_quantity;

use super::Service;
use super::helpers::{exit_not_found, minutes, parse_ingredient_arg, truncate};

pub(crate) fn cmd_recipe_list(svc: &Service, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Servings")]
        servings: u32,
        #[tabled(rename = "Time")]
        time: String,
    }

    let recipes = svc.list_recipes()?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            name: truncate(&r.name, 30),
            category: r.category.clone().unwrap_or_default(),
            servings: r.servings,
            time: minutes(r.total_time()),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &Service, id: i64, json: bool) -> Result<()> {
    let Some(recipe) = svc.get_recipe(id)? else {
        exit_not_found(&format!("Recipe {id} not found"), json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        print_recipe(&recipe);
    }
    Ok(())
}

fn print_recipe(recipe: &Recipe) {
    println!("{} (id: {})", recipe.name, recipe.id);
    if let Some(category) = &recipe.category {
        println!("  Category: {category}");
    }
    println!("  Servings: {}", recipe.servings);
    println!(
        "  Prep: {}  Cook: {}",
        minutes(recipe.prep_time),
        minutes(recipe.cook_time)
    );
    if let Some(description) = &recipe.description {
        println!("\n  {description}");
    }

    println!("\n  INGREDIENTS:");
    if recipe.ingredients.is_empty() {
        println!("    (none)");
    }
    for ing in &recipe.ingredients {
        println!("    {}", ingredient_line(&ing.name, ing.quantity, &ing.unit));
    }

    if !recipe.instructions.is_empty() {
        println!("\n  STEPS:");
        for step in &recipe.instructions {
            println!("    {}. {}", step.step_number, step.text);
        }
    }
}

fn ingredient_line(name: &str, quantity: f64, unit: &str) -> String {
    let qty = format_quantity(quantity);
    if unit.is_empty() {
        format!("{qty} {name}")
    } else {
        format!("{qty} {unit} {name}")
    }
}

pub(crate) fn cmd_recipe_scale(
    svc: &Service,
    id: i64,
    servings: Option<i64>,
    json: bool,
) -> Result<()> {
    let Some(scaled) = svc.scale_recipe(id, servings)? else {
        exit_not_found(&format!("Recipe {id} not found"), json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&scaled)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct ScaledRow {
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Original")]
        original: String,
        #[tabled(rename = "Scaled")]
        scaled: String,
        #[tabled(rename = "Unit")]
        unit: String,
    }

    println!(
        "{}: {} -> {} servings",
        scaled.name, scaled.original_servings, scaled.scaled_servings
    );
    let rows: Vec<ScaledRow> = scaled
        .ingredients
        .iter()
        .map(|i| ScaledRow {
            name: truncate(&i.name, 30),
            original: format_quantity(i.quantity),
            scaled: format_quantity(i.scaled_quantity),
            unit: i.unit.clone(),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) struct RecipeDraft {
    pub name: String,
    pub servings: u32,
    pub category: Option<String>,
    pub description: Option<String>,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
}

pub(crate) fn cmd_recipe_create(svc: &Service, draft: RecipeDraft, json: bool) -> Result<()> {
    let ingredients = draft
        .ingredients
        .iter()
        .map(|s| parse_ingredient_arg(s))
        .collect::<Result<Vec<Ingredient>>>()?;
    let recipe = svc.create_recipe(&NewRecipe {
        name: draft.name,
        category: draft.category,
        description: draft.description,
        servings: draft.servings,
        prep_time: draft.prep_time,
        cook_time: draft.cook_time,
        ingredients,
        instructions: number_steps(&draft.steps),
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let name = &recipe.name;
        let id = recipe.id;
        let count = recipe.ingredients.len();
        let steps = recipe.instructions.len();
        println!("Created recipe: {name} (id: {id}, {count} ingredients, {steps} steps)");
    }
    Ok(())
}

/// Field changes for `recipe edit`; unset fields stay as stored.
pub(crate) struct RecipeEdit {
    pub name: Option<String>,
    pub servings: Option<u32>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    pub steps: Option<Vec<String>>,
}

impl From<RecipeEdit> for RecipeUpdate {
    fn from(edit: RecipeEdit) -> Self {
        Self {
            name: edit.name,
            category: edit.category,
            description: edit.description,
            servings: edit.servings,
            prep_time: edit.prep_time,
            cook_time: edit.cook_time,
            instructions: edit.steps.map(number_steps),
        }
    }
}

pub(crate) fn cmd_recipe_edit(svc: &Service, id: i64, edit: RecipeEdit, json: bool) -> Result<()> {
    let update = RecipeUpdate::from(edit);
    if update.is_empty() {
        bail!("Nothing to change. Pass at least one field, e.g. --servings 4");
    }
    let Some(recipe) = svc.update_recipe(id, &update)? else {
        exit_not_found(&format!("Recipe {id} not found"), json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        println!("Updated recipe {id}");
        print_recipe(&recipe);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_import(
    svc: &Service,
    file: &Path,
    name_override: Option<String>,
    servings_override: Option<u32>,
    json: bool,
) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let stem = file.file_stem().and_then(|s| s.to_str());
    let new_recipe = cooklang_to_recipe(&input, stem, name_override, servings_override)?;

    let recipe = svc.create_recipe(&new_recipe)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let name = &recipe.name;
        let count = recipe.ingredients.len();
        let servings = recipe.servings;
        println!(
            "Imported recipe: {name} (id: {}, {count} ingredients, {servings} servings)",
            recipe.id
        );
    }
    Ok(())
}

/// Build a recipe from Cooklang text. The name comes from the override, the
/// `title` metadata or the file stem; servings from the override or the
/// `servings` metadata, else 1.
fn cooklang_to_recipe(
    input: &str,
    file_stem: Option<&str>,
    name_override: Option<String>,
    servings_override: Option<u32>,
) -> Result<NewRecipe> {
    let (recipe_data, _report) = cooklang::parse(input)
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to parse Cooklang file: {e}"))?;

    let name = name_override
        .or_else(|| recipe_data.metadata.title().map(String::from))
        .or_else(|| file_stem.map(String::from))
        .context("Could not determine recipe name. Use --name to specify one")?;

    let servings = servings_override
        .or_else(|| {
            recipe_data
                .metadata
                .servings()
                .and_then(|s| s.as_number())
        })
        .unwrap_or(1);

    let converter = cooklang::Converter::default();
    let ingredients: Vec<Ingredient> = recipe_data
        .group_ingredients(&converter)
        .iter()
        .map(cooklang_ingredient)
        .collect();

    if ingredients.is_empty() {
        bail!("No ingredients found in recipe");
    }

    Ok(NewRecipe {
        name,
        category: None,
        description: None,
        servings,
        prep_time: None,
        cook_time: None,
        ingredients,
        instructions: cooklang_steps(&recipe_data),
    })
}

/// Steps of every section in order, with ingredients, cookware and timers
/// written out as plain words. Text-only paragraphs are not steps.
fn cooklang_steps(recipe: &cooklang::Recipe) -> Vec<Instruction> {
    let texts = recipe
        .sections
        .iter()
        .flat_map(|section| &section.content)
        .filter_map(|content| match content {
            cooklang::Content::Step(step) => Some(cooklang_step_text(recipe, step)),
            cooklang::Content::Text(_) => None,
        });
    number_steps(texts)
}

fn cooklang_step_text(recipe: &cooklang::Recipe, step: &cooklang::Step) -> String {
    let text: String = step
        .items
        .iter()
        .map(|item| match item {
            cooklang::Item::Text { value } => value.clone(),
            cooklang::Item::Ingredient { index } => recipe
                .ingredients
                .get(*index)
                .map(|i| i.display_name().into_owned())
                .unwrap_or_default(),
            cooklang::Item::Cookware { index } => recipe
                .cookware
                .get(*index)
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            cooklang::Item::Timer { index } => recipe
                .timers
                .get(*index)
                .and_then(|t| {
                    t.quantity
                        .as_ref()
                        .map(ToString::to_string)
                        .or_else(|| t.name.clone())
                })
                .unwrap_or_default(),
            cooklang::Item::InlineQuantity { index } => recipe
                .inline_quantities
                .get(*index)
                .map(ToString::to_string)
                .unwrap_or_default(),
        })
        .collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cooklang_ingredient(gi: &cooklang::ingredient_list::GroupedIngredient<'_>) -> Ingredient {
    // Only the first quantity group is kept; text amounts count as 1
    let (quantity, unit) =
        gi.quantity
            .iter()
            .next()
            .map_or((1.0, String::new()), |qty: &cooklang::Quantity| {
                let value = match qty.value() {
                    cooklang::Value::Number(n) => n.value(),
                    cooklang::Value::Range { start, .. } => start.value(),
                    cooklang::Value::Text(t) => t.trim().parse::<f64>().unwrap_or(1.0),
                };
                (value, qty.unit().unwrap_or_default().to_string())
            });

    Ingredient::new(gi.ingredient.display_name().to_string(), quantity, unit)
}

pub(crate) fn cmd_recipe_delete(svc: &Service, id: i64, json: bool) -> Result<()> {
    if !svc.delete_recipe(id)? {
        exit_not_found(&format!("Recipe {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted recipe {id}");
    }
    Ok(())
}
