//! Common routines for handling input data.
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use log::warn;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub mod batch;
pub mod constraint;
pub mod facility;
pub mod optimisation;
pub mod trace;

/// The placeholder substituted with a year in per-year file names
pub const YEAR_PLACEHOLDER: &str = "$YEAR$";

/// A column which may appear in an input table, along with the other headers it is known by
pub struct Column {
    /// The canonical (field) name of the column
    pub name: &'static str,
    /// Alternative headers, compared after normalisation with [`header_key`]
    pub aliases: &'static [&'static str],
}

/// Reduce a column header to a comparison key.
///
/// Case, whitespace and punctuation are ignored, so "Capital Cost", "capital_cost" and
/// "CAPITAL-COST" all produce the same key.
pub fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Map raw headers onto canonical column names.
///
/// Headers that match no known column are logged once and passed through unchanged (and will
/// subsequently be ignored by the deserialiser).
fn normalise_headers(raw: &csv::StringRecord, columns: &[Column], file_path: &Path) -> Result<csv::StringRecord> {
    let mut seen = HashSet::new();
    let mut out = csv::StringRecord::new();
    for header in raw {
        let key = header_key(header);
        let name = columns
            .iter()
            .find(|col| header_key(col.name) == key || col.aliases.iter().any(|a| header_key(a) == key))
            .map(|col| col.name);

        if let Some(name) = name {
            ensure!(
                seen.insert(name),
                "Column {name} appears more than once (header '{header}')"
            );
            out.push_field(name);
        } else {
            if !header.is_empty() {
                warn!(
                    "Ignoring unknown column '{header}' in {}",
                    file_path.display()
                );
            }
            out.push_field(header);
        }
    }

    Ok(out)
}

/// Read a table of records from a CSV file, normalising column aliases.
///
/// # Arguments
///
/// * `file_path`: Path to the CSV file
/// * `columns`: The columns which the record type understands
///
/// # Returns
///
/// The records in file order, or an error if the file is empty or malformed.
pub fn read_table<T: DeserializeOwned>(file_path: &Path, columns: &[Column]) -> Result<Vec<T>> {
    let records = read_table_internal(file_path, columns).with_context(|| input_err_msg(file_path))?;
    if records.is_empty() {
        bail!("CSV file {} cannot be empty", file_path.display());
    }

    Ok(records)
}

fn read_table_internal<T: DeserializeOwned>(file_path: &Path, columns: &[Column]) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?;
    let headers = normalise_headers(reader.headers()?, columns, file_path)?;
    reader.set_headers(headers);

    let records = reader
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())?;

    Ok(records)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read an optional f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Deserialize::deserialize(deserialiser)?;
    if let Some(value) = value {
        if !(0.0..=1.0).contains(&value) {
            Err(serde::de::Error::custom("Value must be between 0 and 1"))?;
        }
    }

    Ok(value)
}

/// Read an optional f64, checking that it is finite and not negative
pub fn deserialise_non_negative<'de, D>(deserialiser: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Deserialize::deserialize(deserialiser)?;
    if let Some(value) = value {
        if !(value.is_finite() && value >= 0.0) {
            Err(serde::de::Error::custom(
                "Value must be a finite number greater than or equal to zero",
            ))?;
        }
    }

    Ok(value)
}

/// Check whether an iterator contains values that are sorted and unique
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    iter.into_iter().tuple_windows().all(|(a, b)| a < b)
}

/// Parse a semicolon-separated list of numbers (e.g. "100;200;300")
pub fn parse_number_list(s: &str) -> Result<Vec<f64>> {
    s.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("Invalid number in list: {s}"))
        })
        .try_collect()
}

/// Substitute a year into a file name containing [`YEAR_PLACEHOLDER`]
pub fn substitute_year(file_name: &str, year: u32) -> String {
    file_name.replace(YEAR_PLACEHOLDER, &year.to_string())
}
