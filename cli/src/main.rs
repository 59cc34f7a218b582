mod api;
mod commands;
mod config;
mod logging;
mod state;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::commands::{
    RecipeDraft, RecipeEdit, Service, cmd_login, cmd_logout, cmd_plan_add, cmd_plan_delete,
    cmd_plan_edit, cmd_plan_week, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_edit,
    cmd_recipe_import, cmd_recipe_list, cmd_recipe_scale, cmd_recipe_show, cmd_register,
    cmd_shop_generate, cmd_shop_show, cmd_shop_toggle, cmd_whoami, parse_slot,
};
use crate::config::{Config, Settings};
use crate::state::StateStore;
use pantry_core::models::PlannedMealChanges;
use pantry_core::service::PantryService;
use pantry_core::session::{AuthState, SessionStatus};

#[derive(Parser)]
#[command(
    name = "pantry",
    version,
    about = "Plan meals, scale recipes and build shopping lists"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the recipe backend
    Login {
        /// Account email
        email: String,
        /// Password (prompted on stdin when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a new account
    Register {
        /// Display name
        name: String,
        /// Account email
        email: String,
        /// Password (prompted on stdin when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget the stored session
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the logged-in user
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage and scale recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Plan meals for the week
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Build and tick off shopping lists
    Shop {
        #[command(subcommand)]
        command: ShopCommands,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with its ingredients
    Show {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scale a recipe's ingredients to a number of servings
    Scale {
        /// Recipe ID
        id: i64,
        /// Target servings (default: the recipe's own)
        #[arg(allow_negative_numbers = true)]
        servings: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a recipe
    Create {
        /// Recipe name
        name: String,
        /// Number of servings the recipe makes
        #[arg(short, long, default_value = "1")]
        servings: u32,
        /// Ingredient, repeatable (e.g. "200 g Pasta", "500ml Stock", "2 Eggs")
        #[arg(short, long = "ingredient", value_name = "INGREDIENT")]
        ingredients: Vec<String>,
        /// Preparation step, repeatable, in cooking order
        #[arg(long = "step", value_name = "TEXT")]
        steps: Vec<String>,
        /// Category (e.g. dinner, dessert)
        #[arg(long)]
        category: Option<String>,
        /// Short description
        #[arg(long)]
        description: Option<String>,
        /// Preparation time in minutes
        #[arg(long)]
        prep_time: Option<u32>,
        /// Cooking time in minutes
        #[arg(long)]
        cook_time: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a recipe's details or replace its steps
    Edit {
        /// Recipe ID
        id: i64,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// Number of servings the recipe makes
        #[arg(short, long)]
        servings: Option<u32>,
        /// Category (empty to clear)
        #[arg(long)]
        category: Option<String>,
        /// Short description (empty to clear)
        #[arg(long)]
        description: Option<String>,
        /// Preparation time in minutes
        #[arg(long)]
        prep_time: Option<u32>,
        /// Cooking time in minutes
        #[arg(long)]
        cook_time: Option<u32>,
        /// Step, repeatable; replaces all existing steps
        #[arg(long = "step", value_name = "TEXT")]
        steps: Option<Vec<String>>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a recipe from a Cooklang (.cook) file
    Import {
        /// Path to the .cook file
        file: PathBuf,
        /// Recipe name override (defaults to metadata title or filename)
        #[arg(long)]
        name: Option<String>,
        /// Servings override (defaults to metadata servings)
        #[arg(long)]
        servings: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe and its planned meals
    Delete {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Show the Monday-to-Sunday week containing a date
    Week {
        /// Any date in the week (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Weeks to move forward (or back, when negative)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        offset: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Plan a recipe for a date and meal
    Add {
        /// Recipe ID
        recipe_id: i64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "dinner")]
        meal: String,
        /// Servings to cook (default: the recipe's own)
        #[arg(short, long)]
        servings: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the recipe, meal or servings of a planned meal
    Edit {
        /// Planned meal ID
        id: i64,
        /// Date the meal is planned for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Recipe ID to cook instead
        #[arg(short, long = "recipe")]
        recipe_id: Option<i64>,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long)]
        meal: Option<String>,
        /// Servings to cook
        #[arg(short, long)]
        servings: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a planned meal by ID
    Delete {
        /// Planned meal ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ShopCommands {
    /// Build the shopping list for a date range (default: this week)
    ///
    /// Items checked on the last generated list stay checked when its dates
    /// overlap the new range.
    Generate {
        /// First day (default: Monday of the current week)
        #[arg(long)]
        start: Option<String>,
        /// Last day (default: Sunday of the start's week)
        #[arg(long)]
        end: Option<String>,
        /// Aggregate locally instead of storing the list on the backend
        #[arg(long)]
        local: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a stored list, or the last generated one
    Show {
        /// Shopping list ID
        id: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check or uncheck an item on the last generated list
    Toggle {
        /// Item ID
        item_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };
    logging::init(&config.settings.log_level);
    debug!(
        config_file = %config.config_file.display(),
        api_url = %config.settings.api_url,
        "loaded configuration"
    );

    // Commands block on the HTTP client, so they run off the async workers
    let result = tokio::task::spawn_blocking(move || run(cli, &config))
        .await
        .map_err(anyhow::Error::from)
        .and_then(|r| r);

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn auth_state(settings: &Settings, state: &StateStore) -> Result<AuthState> {
    let now = Utc::now();
    if let Some(session) = state.load_session()? {
        match settings.session.status(&session, now) {
            SessionStatus::Expired => {
                warn!("Session expired. Run `pantry login` to sign in again");
            }
            SessionStatus::ExpiringSoon => {
                let minutes = session.remaining(now).num_minutes();
                warn!("Session expires in {minutes} min. Run `pantry login` to renew it");
            }
            SessionStatus::Valid => {}
        }
        return Ok(AuthState::from(Some(session)).effective(now));
    }
    Ok(AuthState::Anonymous)
}

fn service(settings: &Settings, state: &StateStore) -> Result<Service> {
    let client = ApiClient::new(
        &settings.api_url,
        settings.timeout(),
        auth_state(settings, state)?,
    )?;
    Ok(PantryService::new(client).with_zero_target(settings.scaling.zero_target))
}

#[allow(clippy::too_many_lines)]
fn run(cli: Cli, config: &Config) -> Result<()> {
    let settings = &config.settings;
    let state = StateStore::new(&config.data_dir);

    match cli.command {
        Commands::Login {
            email,
            password,
            json,
        } => cmd_login(settings, &state, &email, password, json),
        Commands::Register {
            name,
            email,
            password,
            json,
        } => cmd_register(settings, &name, &email, password, json),
        Commands::Logout { json } => cmd_logout(&state, json),
        Commands::Whoami { json } => {
            let svc = service(settings, &state)?;
            cmd_whoami(settings, svc.store(), json)
        }
        Commands::Recipe { command } => {
            let svc = service(settings, &state)?;
            match command {
                RecipeCommands::List { json } => cmd_recipe_list(&svc, json),
                RecipeCommands::Show { id, json } => cmd_recipe_show(&svc, id, json),
                RecipeCommands::Scale { id, servings, json } => {
                    cmd_recipe_scale(&svc, id, servings, json)
                }
                RecipeCommands::Create {
                    name,
                    servings,
                    ingredients,
                    steps,
                    category,
                    description,
                    prep_time,
                    cook_time,
                    json,
                } => cmd_recipe_create(
                    &svc,
                    RecipeDraft {
                        name,
                        servings,
                        category,
                        description,
                        prep_time,
                        cook_time,
                        ingredients,
                        steps,
                    },
                    json,
                ),
                RecipeCommands::Edit {
                    id,
                    name,
                    servings,
                    category,
                    description,
                    prep_time,
                    cook_time,
                    steps,
                    json,
                } => cmd_recipe_edit(
                    &svc,
                    id,
                    RecipeEdit {
                        name,
                        servings,
                        category,
                        description,
                        prep_time,
                        cook_time,
                        steps,
                    },
                    json,
                ),
                RecipeCommands::Import {
                    file,
                    name,
                    servings,
                    json,
                } => cmd_recipe_import(&svc, &file, name, servings, json),
                RecipeCommands::Delete { id, json } => cmd_recipe_delete(&svc, id, json),
            }
        }
        Commands::Plan { command } => {
            let svc = service(settings, &state)?;
            match command {
                PlanCommands::Week { date, offset, json } => {
                    cmd_plan_week(&svc, date, offset, json)
                }
                PlanCommands::Add {
                    recipe_id,
                    date,
                    meal,
                    servings,
                    json,
                } => cmd_plan_add(&svc, recipe_id, date, &meal, servings, json),
                PlanCommands::Edit {
                    id,
                    date,
                    recipe_id,
                    meal,
                    servings,
                    json,
                } => {
                    let changes = PlannedMealChanges {
                        recipe_id,
                        slot: parse_slot(meal.as_deref())?,
                        target_servings: servings,
                    };
                    cmd_plan_edit(&svc, id, date, changes, json)
                }
                PlanCommands::Delete { id, json } => cmd_plan_delete(&svc, id, json),
            }
        }
        Commands::Shop { command } => {
            let svc = service(settings, &state)?;
            match command {
                ShopCommands::Generate {
                    start,
                    end,
                    local,
                    json,
                } => cmd_shop_generate(&svc, &state, start, end, local, json),
                ShopCommands::Show { id, json } => cmd_shop_show(&svc, &state, id, json),
                ShopCommands::Toggle { item_id, json } => {
                    cmd_shop_toggle(&svc, &state, item_id, json)
                }
            }
        }
    }
}
