use anyhow::Result;
use chrono::NaiveDate;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use tracing::debug;

use crate::state::StateStore;
use pantry_core::models::{DateRange, ShoppingList};
use pantry_core::scale::format_quantity;
use pantry_core::week::WeekWindow;

use super::Service;
use super::helpers::{exit_not_found, parse_date, truncate};

/// Explicit dates win; a missing start is the Monday of the current week and
/// a missing end is the Sunday of the start's week.
fn list_range(start: Option<String>, end: Option<String>) -> Result<DateRange> {
    let start = match start {
        Some(s) => parse_date(Some(s))?,
        None => WeekWindow::containing(parse_date(None)?)?.start(),
    };
    let end: NaiveDate = match end {
        Some(e) => parse_date(Some(e))?,
        None => WeekWindow::containing(start)?.end(),
    };
    Ok(DateRange::new(start, end)?)
}

/// The last list, if its dates overlap `range`. Checked flags follow items
/// by `(name, unit)`, so a list for a shifted or widened range keeps them.
fn carry_over(last: Option<ShoppingList>, range: DateRange) -> Option<ShoppingList> {
    last.filter(|prev| prev.range().is_some_and(|r| r.overlaps(range)))
}

pub(crate) fn cmd_shop_generate(
    svc: &Service,
    state: &StateStore,
    start: Option<String>,
    end: Option<String>,
    local: bool,
    json: bool,
) -> Result<()> {
    let range = list_range(start, end)?;
    let previous = carry_over(state.load_list()?, range);
    debug!(%range, carried = previous.is_some(), local, "generating shopping list");

    let list = if local {
        svc.shopping_list_local(range, previous.as_ref())?
    } else {
        svc.shopping_list_remote(range, previous.as_ref())?
    };
    state.save_list(&list)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        print_list(&list);
    }
    Ok(())
}

pub(crate) fn cmd_shop_show(
    svc: &Service,
    state: &StateStore,
    id: Option<i64>,
    json: bool,
) -> Result<()> {
    let list = match id {
        Some(id) => svc.get_shopping_list(id)?,
        None => state.load_list()?,
    };
    let Some(list) = list else {
        let message = match id {
            Some(id) => format!("Shopping list {id} not found"),
            None => "No shopping list yet. Run `pantry shop generate` first".to_string(),
        };
        exit_not_found(&message, json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        print_list(&list);
    }
    Ok(())
}

pub(crate) fn cmd_shop_toggle(
    svc: &Service,
    state: &StateStore,
    item_id: i64,
    json: bool,
) -> Result<()> {
    let Some(mut list) = state.load_list()? else {
        exit_not_found(
            "No shopping list yet. Run `pantry shop generate` first",
            json,
        );
    };

    let result = svc.toggle_item(&mut list, item_id);
    // On failure the list has been reconciled with the backend; keep that
    state.save_list(&list)?;
    let item = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let mark = if item.checked { "Checked" } else { "Unchecked" };
        let remaining = list.remaining();
        println!("{mark} {} ({remaining} left)", item.name);
    }
    Ok(())
}

fn print_list(list: &ShoppingList) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "")]
        checked: &'static str,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Unit")]
        unit: String,
    }

    let heading = match list.id {
        Some(id) => format!("Shopping list {id}"),
        None => "Shopping list (local)".to_string(),
    };
    println!("{heading}: {} to {}", list.start_date, list.end_date);

    if list.items.is_empty() {
        println!("Nothing to buy: no meals planned in this range");
        return;
    }

    let rows: Vec<ItemRow> = list
        .items
        .iter()
        .map(|i| ItemRow {
            id: i.id,
            checked: if i.checked { "x" } else { " " },
            name: truncate(&i.name, 30),
            quantity: format_quantity(i.quantity),
            unit: i.unit.clone(),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("{} of {} items left", list.remaining(), list.items.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use pantry_core::PlanError;
    use pantry_core::models::ShoppingListItem;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_explicit() {
        let range = list_range(Some("2024-06-12".into()), Some("2024-06-20".into())).unwrap();
        assert_eq!(range.start(), date(2024, 6, 12));
        assert_eq!(range.end(), date(2024, 6, 20));
    }

    #[test]
    fn test_range_end_defaults_to_week_end() {
        let range = list_range(Some("2024-06-12".into()), None).unwrap();
        assert_eq!(range.end(), date(2024, 6, 16));
    }

    #[test]
    fn test_range_defaults_to_current_week() {
        let range = list_range(None, None).unwrap();
        assert_eq!(range.num_days(), 7);
        assert_eq!(range.start().weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn test_range_at_end_of_calendar() {
        let err = list_range(Some("+262142-12-31".into()), None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::OutOfCalendar(_))
        ));
        let range =
            list_range(Some("+262142-12-25".into()), Some("+262142-12-31".into())).unwrap();
        assert_eq!(range.num_days(), 7);
    }

    fn list(start: NaiveDate, end: NaiveDate) -> ShoppingList {
        ShoppingList {
            id: None,
            start_date: start,
            end_date: end,
            items: vec![ShoppingListItem {
                id: 1,
                name: "Salt".to_string(),
                unit: "tsp".to_string(),
                quantity: 1.0,
                checked: true,
            }],
        }
    }

    #[test]
    fn test_carry_over_overlapping_range() {
        let week = DateRange::new(date(2024, 6, 10), date(2024, 6, 16)).unwrap();
        let same = list(date(2024, 6, 10), date(2024, 6, 16));
        assert_eq!(carry_over(Some(same.clone()), week), Some(same));

        let widened = list(date(2024, 6, 12), date(2024, 6, 20));
        assert!(carry_over(Some(widened), week).is_some());

        let next_week = list(date(2024, 6, 17), date(2024, 6, 23));
        assert!(carry_over(Some(next_week), week).is_none());
        assert!(carry_over(None, week).is_none());
    }

    #[test]
    fn test_range_rejects_reversed_dates() {
        assert!(list_range(Some("2024-06-12".into()), Some("2024-06-10".into())).is_err());
    }
}
