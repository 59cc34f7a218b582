pub mod error;
pub mod models;
pub mod scale;
pub mod service;
pub mod session;
pub mod shopping;
pub mod store;
pub mod week;
pub mod wire;

pub use error::PlanError;
pub use service::{PantryService, RecipeStore};
pub use store::MemoryStore;
