use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::header::{self, HeaderMap};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use pantry_core::models::{
    DateRange, Instruction, NewPlannedMeal, NewRecipe, PlannedMealRef, PlannedMealUpdate, Recipe,
    ShoppingList,
};
use pantry_core::service::RecipeStore;
use pantry_core::session::{AuthState, User};
use pantry_core::wire::{
    AddRecipeIngredientRequest, CreateIngredientRequest, CreatedPayload, ErrorPayload,
    IngredientEntryPayload, InstructionPayload, LoginRequest, MealPlanPayload, ProfilePayload,
    RecipePayload, RegisterRequest, ShoppingListPayload, format_wire_date, generate_request,
    instruction_request, instructions_from_payload, meal_plan_request, meal_plan_update_request,
    planned_meal_from_payload, recipe_from_payload, recipe_request, recipe_update_request,
    shopping_list_from_payload, user_from_payload,
};

pub const AUTH_COOKIE: &str = "auth_token";

/// HTTP client for the recipe backend.
///
/// Async methods do the work; the `RecipeStore` impl blocks on them and must
/// be called from a blocking thread, never from inside an async task.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    auth: AuthState,
    rt: tokio::runtime::Handle,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, auth: AuthState) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "pantry-cli/{} (meal planner)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        let rt = tokio::runtime::Handle::try_current()
            .context("The API client needs a running tokio runtime")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            rt,
        })
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_as(method, path, self.auth.token())
    }

    fn request_as(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let rb = self.client.request(method, format!("{}{path}", self.base_url));
        match token {
            Some(token) => rb.header(header::COOKIE, format!("{AUTH_COOKIE}={token}")),
            None => rb,
        }
    }

    async fn send(&self, rb: RequestBuilder, path: &str) -> Result<Response> {
        let resp = rb
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", self.base_url))?;
        debug!(status = %resp.status(), path, "backend response");
        error_for_status(resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send(self.request(Method::GET, path), path).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {path}"))
    }

    /// Like `get_json`, with 404 mapped to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let resp = self
            .request(Method::GET, path)
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", self.base_url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = error_for_status(resp).await?;
        let value = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {path}"))?;
        Ok(Some(value))
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        self.send(self.request(Method::POST, path).json(body), path)
            .await
    }

    /// Returns `false` on 404.
    async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<bool> {
        let resp = self
            .request(Method::PUT, path)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", self.base_url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        error_for_status(resp).await?;
        Ok(true)
    }

    /// Returns `false` on 404.
    async fn delete(&self, path: &str) -> Result<bool> {
        let resp = self
            .request(Method::DELETE, path)
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", self.base_url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        error_for_status(resp).await?;
        Ok(true)
    }

    // --- Auth ---

    /// Log in and return the session token.
    pub async fn login_async(&self, email: &str, password: &str) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", self.base_url))?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            bail!("Invalid email or password");
        }
        let resp = error_for_status(resp).await?;
        if let Some(token) = token_from_headers(resp.headers()) {
            return Ok(token);
        }
        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        body.get("token")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .context("Login succeeded but the backend returned no session token")
    }

    pub async fn register_async(&self, name: &str, email: &str, password: &str) -> Result<()> {
        let body = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("/auth/register", &body).await?;
        Ok(())
    }

    pub async fn profile_async(&self) -> Result<User> {
        let payload: ProfilePayload = self.get_json("/profile").await?;
        Ok(user_from_payload(payload)?)
    }

    /// Profile for a token that is not yet part of a saved session.
    pub async fn profile_for_token_async(&self, token: &str) -> Result<User> {
        let path = "/profile";
        let payload: ProfilePayload = self
            .send(self.request_as(Method::GET, path, Some(token)), path)
            .await?
            .json()
            .await
            .context("Failed to parse profile")?;
        Ok(user_from_payload(payload)?)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<String> {
        self.rt.block_on(self.login_async(email, password))
    }

    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<()> {
        self.rt.block_on(self.register_async(name, email, password))
    }

    pub fn profile(&self) -> Result<User> {
        self.rt.block_on(self.profile_async())
    }

    pub fn profile_for_token(&self, token: &str) -> Result<User> {
        self.rt.block_on(self.profile_for_token_async(token))
    }

    // --- Recipes ---

    pub async fn list_recipes_async(&self) -> Result<Vec<Recipe>> {
        let payloads: Option<Vec<RecipePayload>> = self.get_json("/recipes").await?;
        payloads
            .unwrap_or_default()
            .into_iter()
            .map(|p| recipe_from_payload(p).map_err(anyhow::Error::from))
            .collect()
    }

    pub async fn get_recipe_async(&self, id: i64) -> Result<Option<Recipe>> {
        let payload: Option<RecipePayload> = self.get_optional(&format!("/recipes/{id}")).await?;
        payload
            .map(recipe_from_payload)
            .transpose()
            .with_context(|| format!("Backend sent an invalid recipe {id}"))
    }

    /// Create the recipe, then attach each ingredient through the shared
    /// ingredient catalogue, adding missing catalogue entries first.
    pub async fn create_recipe_async(&self, recipe: &NewRecipe) -> Result<Recipe> {
        let created: CreatedPayload = self
            .post("/recipes", &recipe_request(recipe))
            .await?
            .json()
            .await
            .context("Failed to parse created recipe id")?;
        let id = created.id;

        let mut catalogue = if recipe.ingredients.is_empty() {
            HashMap::new()
        } else {
            self.ingredient_catalogue().await?
        };
        for ing in &recipe.ingredients {
            let ingredient_id = self.ingredient_id(&mut catalogue, &ing.name).await?;
            let body = AddRecipeIngredientRequest {
                ingredient_id,
                quantity: ing.quantity,
                unit: ing.unit.clone(),
            };
            self.post(&format!("/recipes/{id}/ingredients"), &body)
                .await
                .with_context(|| format!("Failed to add '{}' to recipe {id}", ing.name))?;
        }
        self.add_instructions(id, &recipe.instructions).await?;

        self.get_recipe_async(id)
            .await?
            .with_context(|| format!("Recipe {id} was created but could not be read back"))
    }

    async fn ingredient_catalogue(&self) -> Result<HashMap<String, i64>> {
        let entries: Option<Vec<IngredientEntryPayload>> = self.get_json("/ingredients").await?;
        Ok(entries
            .unwrap_or_default()
            .into_iter()
            .map(|e| (e.name, e.id))
            .collect())
    }

    async fn ingredient_id(&self, catalogue: &mut HashMap<String, i64>, name: &str) -> Result<i64> {
        if let Some(&id) = catalogue.get(name) {
            return Ok(id);
        }
        let body = CreateIngredientRequest {
            name: name.to_string(),
        };
        self.post("/ingredients", &body).await?;
        *catalogue = self.ingredient_catalogue().await?;
        catalogue
            .get(name)
            .copied()
            .with_context(|| format!("Ingredient '{name}' missing from catalogue after creation"))
    }

    /// Store the recipe's fields, then replace its steps if they differ from
    /// the stored ones. Ingredients are not touched.
    pub async fn update_recipe_async(&self, recipe: &Recipe) -> Result<bool> {
        let id = recipe.id;
        let path = format!("/recipes/{id}");
        if !self.put(&path, &recipe_update_request(recipe)).await? {
            return Ok(false);
        }

        let stored = self.instruction_payloads(id).await?;
        let current = instructions_from_payload(Some(stored.clone()))?;
        if current == recipe.instructions {
            return Ok(true);
        }
        debug!(id, old = current.len(), new = recipe.instructions.len(), "replacing steps");
        for step in &stored {
            let path = format!("/recipes/{id}/instructions/{}", step.id);
            self.delete(&path).await.with_context(|| {
                format!("Failed to remove step {} of recipe {id}", step.step_number)
            })?;
        }
        self.add_instructions(id, &recipe.instructions).await?;
        Ok(true)
    }

    pub async fn delete_recipe_async(&self, id: i64) -> Result<bool> {
        self.delete(&format!("/recipes/{id}")).await
    }

    pub async fn list_instructions_async(&self, recipe_id: i64) -> Result<Vec<Instruction>> {
        let payloads = self.instruction_payloads(recipe_id).await?;
        Ok(instructions_from_payload(Some(payloads))?)
    }

    async fn instruction_payloads(&self, recipe_id: i64) -> Result<Vec<InstructionPayload>> {
        let payloads: Option<Vec<InstructionPayload>> = self
            .get_json(&format!("/recipes/{recipe_id}/instructions"))
            .await?;
        Ok(payloads.unwrap_or_default())
    }

    async fn add_instructions(&self, recipe_id: i64, steps: &[Instruction]) -> Result<()> {
        let path = format!("/recipes/{recipe_id}/instructions");
        for step in steps {
            self.post(&path, &instruction_request(step))
                .await
                .with_context(|| {
                    format!("Failed to add step {} to recipe {recipe_id}", step.step_number)
                })?;
        }
        Ok(())
    }

    // --- Meal plans ---

    pub async fn list_planned_meals_async(&self, range: DateRange) -> Result<Vec<PlannedMealRef>> {
        let path = "/meal-plans";
        let rb = self.request(Method::GET, path).query(&[
            ("start_date", format_wire_date(range.start())),
            ("end_date", format_wire_date(range.end())),
        ]);
        let payloads: Option<Vec<MealPlanPayload>> = self
            .send(rb, path)
            .await?
            .json()
            .await
            .context("Failed to parse meal plans")?;
        payloads
            .unwrap_or_default()
            .into_iter()
            .map(|p| planned_meal_from_payload(p).map_err(anyhow::Error::from))
            .collect()
    }

    pub async fn add_planned_meal_async(&self, meal: &NewPlannedMeal) -> Result<()> {
        self.post("/meal-plans", &meal_plan_request(meal)).await?;
        Ok(())
    }

    pub async fn update_planned_meal_async(
        &self,
        id: i64,
        update: &PlannedMealUpdate,
    ) -> Result<bool> {
        self.put(&format!("/meal-plans/{id}"), &meal_plan_update_request(update))
            .await
    }

    pub async fn delete_planned_meal_async(&self, id: i64) -> Result<bool> {
        self.delete(&format!("/meal-plans/{id}")).await
    }

    // --- Shopping lists ---

    pub async fn generate_shopping_list_async(&self, range: DateRange) -> Result<ShoppingList> {
        let payload: ShoppingListPayload = self
            .post("/shopping-lists/generate", &generate_request(range))
            .await?
            .json()
            .await
            .context("Failed to parse generated shopping list")?;
        Ok(shopping_list_from_payload(payload)?)
    }

    pub async fn get_shopping_list_async(&self, id: i64) -> Result<Option<ShoppingList>> {
        let payload: Option<ShoppingListPayload> =
            self.get_optional(&format!("/shopping-lists/{id}")).await?;
        Ok(payload.map(shopping_list_from_payload).transpose()?)
    }

    pub async fn toggle_item_async(&self, item_id: i64) -> Result<()> {
        let path = format!("/shopping-lists/items/{item_id}/toggle");
        self.send(self.request(Method::PATCH, &path), &path).await?;
        Ok(())
    }
}

impl RecipeStore for ApiClient {
    fn list_recipes(&self) -> Result<Vec<Recipe>> {
        self.rt.block_on(self.list_recipes_async())
    }

    fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        self.rt.block_on(self.get_recipe_async(id))
    }

    fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        self.rt.block_on(self.create_recipe_async(recipe))
    }

    fn update_recipe(&self, recipe: &Recipe) -> Result<bool> {
        self.rt.block_on(self.update_recipe_async(recipe))
    }

    fn delete_recipe(&self, id: i64) -> Result<bool> {
        self.rt.block_on(self.delete_recipe_async(id))
    }

    fn list_instructions(&self, recipe_id: i64) -> Result<Vec<Instruction>> {
        self.rt.block_on(self.list_instructions_async(recipe_id))
    }

    fn list_planned_meals(&self, range: DateRange) -> Result<Vec<PlannedMealRef>> {
        self.rt.block_on(self.list_planned_meals_async(range))
    }

    fn add_planned_meal(&self, meal: &NewPlannedMeal) -> Result<()> {
        self.rt.block_on(self.add_planned_meal_async(meal))
    }

    fn update_planned_meal(&self, id: i64, update: &PlannedMealUpdate) -> Result<bool> {
        self.rt.block_on(self.update_planned_meal_async(id, update))
    }

    fn delete_planned_meal(&self, id: i64) -> Result<bool> {
        self.rt.block_on(self.delete_planned_meal_async(id))
    }

    fn generate_shopping_list(&self, range: DateRange) -> Result<ShoppingList> {
        self.rt.block_on(self.generate_shopping_list_async(range))
    }

    fn get_shopping_list(&self, id: i64) -> Result<Option<ShoppingList>> {
        self.rt.block_on(self.get_shopping_list_async(id))
    }

    fn toggle_item(&self, item_id: i64) -> Result<()> {
        self.rt.block_on(self.toggle_item_async(item_id))
    }
}

async fn error_for_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        bail!("Not logged in or session expired. Run `pantry login` first");
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorPayload>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    bail!("Backend returned {status}: {}", message.trim())
}

/// The `auth_token` value from any `Set-Cookie` header.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let pair = cookie.split(';').next()?.trim();
            let (name, value) = pair.split_once('=')?;
            (name == AUTH_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}
