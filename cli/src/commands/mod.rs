mod auth;
mod helpers;
mod plan;
mod recipe;
mod shopping;

use crate::api::ApiClient;
use pantry_core::service::PantryService;

/// The service every data command runs against.
pub(crate) type Service = PantryService<ApiClient>;

pub(crate) use auth::{cmd_login, cmd_logout, cmd_register, cmd_whoami};
pub(crate) use plan::{cmd_plan_add, cmd_plan_delete, cmd_plan_edit, cmd_plan_week, parse_slot};
pub(crate) use recipe::{
    RecipeDraft, RecipeEdit, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_edit,
    cmd_recipe_import, cmd_recipe_list, cmd_recipe_scale, cmd_recipe_show,
};
pub(crate) use shopping::{cmd_shop_generate, cmd_shop_show, cmd_shop_toggle};
