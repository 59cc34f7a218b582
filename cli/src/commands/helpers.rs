use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::process;

use pantry_core::models::Ingredient;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse an ingredient written as `"200 g Pasta"`, `"200g Pasta"` or
/// `"2 Eggs"` (no unit).
pub(crate) fn parse_ingredient_arg(s: &str) -> Result<Ingredient> {
    let s = s.trim();
    let (first, rest) = s
        .split_once(char::is_whitespace)
        .with_context(|| format!("Invalid ingredient '{s}'. Use e.g. '200 g Pasta'"))?;
    let rest = rest.trim();

    let (quantity, unit, name) = if let Ok(qty) = first.parse::<f64>() {
        match rest.split_once(char::is_whitespace) {
            Some((unit, name)) => (qty, unit, name.trim()),
            None => (qty, "", rest),
        }
    } else if let Some((qty, unit)) = split_number_unit(first) {
        (qty, unit, rest)
    } else {
        bail!("Invalid quantity in '{s}'. Use e.g. '200 g Pasta'");
    };

    if !quantity.is_finite() || quantity < 0.0 {
        bail!("Quantity must be a non-negative number in '{s}'");
    }
    Ok(Ingredient::new(name, quantity, unit))
}

/// Split "500ml" or "2.5tbsp" into (500.0, "ml") or (2.5, "tbsp").
fn split_number_unit(s: &str) -> Option<(f64, &str)> {
    let idx = s.find(|c: char| c.is_alphabetic())?;
    if idx == 0 {
        return None;
    }
    let (num_part, unit_part) = s.split_at(idx);
    let qty: f64 = num_part.parse().ok()?;
    Some((qty, unit_part))
}

pub(crate) fn prompt_password() -> Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

pub(crate) fn minutes(m: Option<u32>) -> String {
    m.map_or_else(|| "-".to_string(), |m| format!("{m} min"))
}
