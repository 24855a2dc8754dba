//! Code for working with years.
use crate::input::is_sorted_and_unique;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;

/// Parse a string of years separated by semicolons into a vector of u32 years.
///
/// The string can be a single year or a semicolon-separated list of years (e.g.
/// "2030;2040;2050" or "2030; 2040; 2050"). Years must be given in order without repeats.
///
/// # Arguments
///
/// - `s` - Input string to parse
///
/// # Returns
///
/// A [`Vec`] of years or an error.
pub fn parse_year_str(s: &str) -> Result<Vec<u32>> {
    let s = s.trim();
    ensure!(!s.is_empty(), "No years provided");

    let years: Vec<u32> = s
        .split(';')
        .map(str::trim)
        .filter(|y| !y.is_empty())
        .map(|y| y.parse().with_context(|| format!("Invalid year: {y}")))
        .try_collect()?;

    ensure!(
        is_sorted_and_unique(&years),
        "Years must be in order and unique"
    );

    Ok(years)
}
