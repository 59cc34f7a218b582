use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by the pure planning core.
///
/// An empty date range or a recipe without ingredients is not an error:
/// those produce empty results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Recipe '{name}' has invalid base servings ({servings}); must be greater than 0")]
    InvalidRecipe { name: String, servings: i64 },

    #[error("Target servings must be greater than 0 (got {0})")]
    OutOfRangeServings(i64),

    #[error("Invalid date range: end date {end} is before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("The week containing {0} falls outside the supported calendar")]
    OutOfCalendar(NaiveDate),

    #[error("Shopping list item {0} not found")]
    ItemNotFound(i64),

    #[error("Invalid payload: {0}")]
    Payload(String),
}

impl PlanError {
    pub(crate) fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }
}
