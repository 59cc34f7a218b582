use chrono::{Datelike, Days, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::models::{DateRange, PlannedMeal};

/// A Monday-first, seven-day planner window. Both its Monday and its Sunday
/// are representable dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekWindow {
    start: NaiveDate,
}

impl WeekWindow {
    /// The window containing `anchor`. A Sunday belongs to the week of the
    /// Monday six days earlier. Fails for the partial weeks at either end
    /// of the calendar.
    pub fn containing(anchor: NaiveDate) -> Result<Self, PlanError> {
        let back = u64::from(anchor.weekday().num_days_from_monday());
        anchor
            .checked_sub_days(Days::new(back))
            .and_then(Self::from_monday)
            .ok_or(PlanError::OutOfCalendar(anchor))
    }

    fn from_monday(start: NaiveDate) -> Option<Self> {
        start.checked_add_days(Days::new(6))?;
        Some(Self { start })
    }

    /// Monday.
    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Sunday.
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.day(6)
    }

    #[must_use]
    pub fn days(&self) -> [NaiveDate; 7] {
        std::array::from_fn(|i| self.day(i as u64))
    }

    fn day(&self, offset: u64) -> NaiveDate {
        // construction guarantees the Sunday exists
        self.start
            .checked_add_days(Days::new(offset))
            .unwrap_or(NaiveDate::MAX)
    }

    #[must_use]
    pub fn range(&self) -> DateRange {
        DateRange::from_ordered(self.start, self.end())
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end()
    }

    /// Move by `delta` whole weeks. `None` only past the calendar's limits.
    #[must_use]
    pub fn shift(self, delta: i64) -> Option<Self> {
        let offset = Duration::try_weeks(delta)?;
        Self::from_monday(self.start.checked_add_signed(offset)?)
    }

    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.shift(1)
    }

    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.shift(-1)
    }
}

/// The seven dates, Monday through Sunday, of the week containing `anchor`.
pub fn week_window(anchor: NaiveDate) -> Result<[NaiveDate; 7], PlanError> {
    Ok(WeekWindow::containing(anchor)?.days())
}

#[must_use]
pub fn shift_week(window: WeekWindow, delta: i64) -> Option<WeekWindow> {
    window.shift(delta)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub meals: Vec<PlannedMeal>,
}

/// A week of planned meals, one entry per day even when the day is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekPlan {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<DayPlan>,
}

impl WeekPlan {
    /// Group `meals` into the days of `window`, each day ordered by slot.
    /// Meals outside the window are ignored.
    #[must_use]
    pub fn build(window: WeekWindow, meals: Vec<PlannedMeal>) -> Self {
        let mut days: Vec<DayPlan> = window
            .days()
            .into_iter()
            .map(|date| DayPlan {
                date,
                meals: Vec::new(),
            })
            .collect();
        for meal in meals {
            if let Some(day) = days.iter_mut().find(|d| d.date == meal.date) {
                day.meals.push(meal);
            }
        }
        for day in &mut days {
            day.meals.sort_by_key(|m| (m.slot, m.id));
        }
        Self {
            start: window.start(),
            end: window.end(),
            days,
        }
    }

    #[must_use]
    pub fn meal_count(&self) -> usize {
        self.days.iter().map(|d| d.meals.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MealSlot, Recipe};
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_sunday_belongs_to_previous_monday() {
        let days = week_window(date(2024, 6, 16)).unwrap();
        assert_eq!(days[0], date(2024, 6, 10));
        assert_eq!(days[6], date(2024, 6, 16));
    }

    #[test]
    fn test_monday_starts_its_own_week() {
        let window = WeekWindow::containing(date(2024, 6, 10)).unwrap();
        assert_eq!(window.start(), date(2024, 6, 10));
        assert_eq!(window.end(), date(2024, 6, 16));
    }

    #[test]
    fn test_every_weekday_maps_to_same_window() {
        let monday = date(2024, 6, 10);
        for offset in 0..7 {
            let anchor = monday + Days::new(offset);
            assert_eq!(WeekWindow::containing(anchor).unwrap().start(), monday);
        }
    }

    #[test]
    fn test_days_are_consecutive_monday_to_sunday() {
        let days = week_window(date(2024, 6, 12)).unwrap();
        assert_eq!(days[0].weekday(), Weekday::Mon);
        assert_eq!(days[6].weekday(), Weekday::Sun);
        for pair in days.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::days(1));
        }
    }

    #[test]
    fn test_window_across_year_boundary() {
        let window = WeekWindow::containing(date(2025, 1, 1)).unwrap();
        assert_eq!(window.start(), date(2024, 12, 30));
        assert_eq!(window.end(), date(2025, 1, 5));
    }

    #[test]
    fn test_window_across_leap_day() {
        let days = week_window(date(2024, 2, 29)).unwrap();
        assert_eq!(days[0], date(2024, 2, 26));
        assert_eq!(days[3], date(2024, 2, 29));
        assert_eq!(days[4], date(2024, 3, 1));
    }

    #[test]
    fn test_shift_round_trip() {
        let window = WeekWindow::containing(date(2024, 6, 12)).unwrap();
        for n in [0, 1, 3, 52, 520] {
            let there = shift_week(window, n).unwrap();
            assert_eq!(shift_week(there, -n).unwrap(), window);
            let back = shift_week(window, -n).unwrap();
            assert_eq!(shift_week(back, n).unwrap(), window);
        }
    }

    #[test]
    fn test_next_and_previous() {
        let window = WeekWindow::containing(date(2024, 6, 12)).unwrap();
        assert_eq!(window.next().unwrap().start(), date(2024, 6, 17));
        assert_eq!(window.previous().unwrap().start(), date(2024, 6, 3));
        assert_eq!(window.next().unwrap().previous().unwrap(), window);
    }

    #[test]
    fn test_shift_out_of_calendar() {
        let window = WeekWindow::containing(date(2024, 6, 12)).unwrap();
        assert!(window.shift(i64::MAX).is_none());
        assert!(window.shift(i64::MIN).is_none());
    }

    #[test]
    fn test_containing_at_calendar_limits() {
        // the first and last weeks of the calendar are partial
        assert_eq!(
            WeekWindow::containing(NaiveDate::MAX).unwrap_err(),
            PlanError::OutOfCalendar(NaiveDate::MAX)
        );
        assert!(WeekWindow::containing(NaiveDate::MIN).is_err());
        assert!(week_window(NaiveDate::MAX).is_err());
    }

    #[test]
    fn test_last_full_week_of_calendar() {
        let mut sunday = NaiveDate::MAX;
        while sunday.weekday() != Weekday::Sun {
            sunday = sunday.pred_opt().unwrap();
        }
        let window = WeekWindow::containing(sunday).unwrap();
        assert_eq!(window.end(), sunday);
        assert_eq!(window.days()[6], sunday);
        assert!(window.next().is_none());
        assert_eq!(window.previous().unwrap().next().unwrap(), window);
    }

    #[test]
    fn test_first_full_week_of_calendar() {
        let mut monday = NaiveDate::MIN;
        while monday.weekday() != Weekday::Mon {
            monday = monday.succ_opt().unwrap();
        }
        let window = WeekWindow::containing(monday).unwrap();
        assert_eq!(window.start(), monday);
        assert!(window.previous().is_none());
    }

    fn meal(id: i64, date: NaiveDate, slot: MealSlot) -> PlannedMeal {
        PlannedMeal {
            id,
            date,
            slot,
            recipe: Recipe {
                id: 1,
                name: "Pasta".to_string(),
                category: None,
                description: None,
                servings: 2,
                prep_time: None,
                cook_time: None,
                ingredients: vec![],
                instructions: vec![],
            },
            target_servings: 2,
        }
    }

    #[test]
    fn test_week_plan_groups_by_day_and_slot() {
        let window = WeekWindow::containing(date(2024, 6, 12)).unwrap();
        let plan = WeekPlan::build(
            window,
            vec![
                meal(1, date(2024, 6, 12), MealSlot::Dinner),
                meal(2, date(2024, 6, 12), MealSlot::Breakfast),
                meal(3, date(2024, 6, 16), MealSlot::Lunch),
                meal(4, date(2024, 6, 17), MealSlot::Lunch),
            ],
        );
        assert_eq!(plan.days.len(), 7);
        assert_eq!(plan.start, date(2024, 6, 10));
        assert_eq!(plan.meal_count(), 3);
        let wednesday: Vec<i64> = plan.days[2].meals.iter().map(|m| m.id).collect();
        assert_eq!(wednesday, vec![2, 1]);
        assert_eq!(plan.days[6].meals[0].id, 3);
        assert!(plan.days[0].meals.is_empty());
    }

    #[test]
    fn test_range_and_contains() {
        let window = WeekWindow::containing(date(2024, 6, 12)).unwrap();
        let range = window.range();
        assert_eq!(range.start(), date(2024, 6, 10));
        assert_eq!(range.end(), date(2024, 6, 16));
        assert_eq!(range.num_days(), 7);
        assert!(window.contains(date(2024, 6, 16)));
        assert!(!window.contains(date(2024, 6, 17)));
        assert!(!window.contains(date(2024, 6, 9)));
    }
}
