//! Code for reading the hourly data sheet and per-year load files.
use super::input_err_msg;
use crate::error::PowermatchError;
use crate::facility::FacilityID;
use crate::trace::TraceMatrix;
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use log::debug;
use std::path::Path;

/// Label of the row starting the data block
const HOUR_LABEL: &str = "Hour";
/// Label of the optional row holding facility names
const TECHNOLOGY_LABEL: &str = "Technology";
/// Label of the optional row holding zone names
const ZONE_LABEL: &str = "Zone";
/// Name of the load column
pub const LOAD_COLUMN: &str = "Load";

/// The first column holding a trace (after the hour index and period label)
const FIRST_TRACE_COLUMN: usize = 2;

/// Parse one cell of trace data. Empty cells read as zero.
fn parse_cell(cell: &str, column: &str, row: usize) -> Result<f64> {
    if cell.is_empty() {
        return Ok(0.0);
    }

    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => bail!(PowermatchError::data_shape(format!(
            "Invalid value '{cell}' for {column} in data row {row}"
        ))),
    }
}

/// Work out the name of each trace column from the header rows.
///
/// Names come from the `Technology` row if present, else from the `Hour` row itself. A
/// non-empty `Zone` cell prefixes the name as `Zone.Name` (the load column is never prefixed).
fn column_names(
    header: &csv::StringRecord,
    technology: Option<&csv::StringRecord>,
    zone: Option<&csv::StringRecord>,
) -> Vec<String> {
    let names = technology.unwrap_or(header);
    (FIRST_TRACE_COLUMN..names.len())
        .map(|i| {
            let name = names.get(i).unwrap_or_default();
            let zone = zone.and_then(|z| z.get(i)).unwrap_or_default();
            if zone.is_empty() || unicase::eq_ascii(name, LOAD_COLUMN) {
                name.to_string()
            } else {
                format!("{zone}.{name}")
            }
        })
        .collect()
}

fn read_traces_internal(file_path: &Path) -> Result<TraceMatrix> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(file_path)?;
    let mut records = reader.records();

    // Rows before the data block
    let mut technology = None;
    let mut zone = None;
    let header = loop {
        let Some(record) = records.next() else {
            bail!(PowermatchError::data_shape(format!(
                "No '{HOUR_LABEL}' row found"
            )));
        };
        let record = record?;
        let label = record.get(0).unwrap_or_default();
        if unicase::eq_ascii(label, HOUR_LABEL) {
            break record;
        } else if unicase::eq_ascii(label, TECHNOLOGY_LABEL) {
            technology = Some(record);
        } else if unicase::eq_ascii(label, ZONE_LABEL) {
            zone = Some(record);
        }
    };
    let names = column_names(&header, technology.as_ref(), zone.as_ref());

    let mut load_column = None;
    let mut trace_columns: IndexMap<FacilityID, usize> = IndexMap::new();
    for (i, name) in names.iter().enumerate() {
        if name.is_empty() {
            continue;
        }
        if unicase::eq_ascii(name.as_str(), LOAD_COLUMN) {
            ensure!(
                load_column.replace(i).is_none(),
                PowermatchError::data_shape("The load column appears more than once")
            );
        } else {
            ensure!(
                trace_columns.insert(name.as_str().into(), i).is_none(),
                PowermatchError::data_shape(format!("Duplicate trace column {name}"))
            );
        }
    }
    let Some(load_column) = load_column else {
        bail!(PowermatchError::data_shape(format!(
            "No '{LOAD_COLUMN}' column found"
        )));
    };

    let mut periods = Vec::new();
    let mut load = Vec::new();
    let mut traces: Vec<Vec<f64>> = vec![Vec::new(); trace_columns.len()];
    for (row, record) in records.enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        ensure!(
            record.len() >= FIRST_TRACE_COLUMN + names.len(),
            PowermatchError::data_shape(format!(
                "Data row {row} has {} columns, expected {}",
                record.len(),
                FIRST_TRACE_COLUMN + names.len()
            ))
        );

        periods.push(record[1].to_string());
        load.push(parse_cell(
            &record[FIRST_TRACE_COLUMN + load_column],
            LOAD_COLUMN,
            row,
        )?);
        for ((name, column), trace) in trace_columns.iter().zip(traces.iter_mut()) {
            trace.push(parse_cell(
                &record[FIRST_TRACE_COLUMN + column],
                name.as_str(),
                row,
            )?);
        }
    }

    debug!(
        "Read {} steps for {} traces from {}",
        load.len(),
        trace_columns.len(),
        file_path.display()
    );
    let traces = trace_columns.into_keys().zip(traces).collect();
    TraceMatrix::new(periods, load, traces)
}

/// Read the hourly data sheet.
///
/// The sheet may start with `Technology` and `Zone` rows. The row whose first cell is `Hour`
/// heads the data block, in which column 1 holds the step index, column 2 a period label and
/// the remaining columns one trace each. The `Load` column is the load trace.
///
/// # Arguments
///
/// * `file_path` - Path to the data CSV file
pub fn read_traces(file_path: &Path) -> Result<TraceMatrix> {
    read_traces_internal(file_path).with_context(|| input_err_msg(file_path))
}

fn read_load_internal(file_path: &Path, len: usize) -> Result<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?;
    let headers = reader.headers()?;
    let column = match headers.iter().position(|h| unicase::eq_ascii(h, LOAD_COLUMN)) {
        Some(column) => column,
        None if headers.len() == 1 => 0,
        None => bail!(PowermatchError::data_shape(format!(
            "No '{LOAD_COLUMN}' column found"
        ))),
    };

    let mut load = Vec::with_capacity(len);
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let cell = record.get(column).unwrap_or_default();
        load.push(parse_cell(cell, LOAD_COLUMN, row)?);
    }
    ensure!(
        load.len() == len,
        PowermatchError::data_shape(format!(
            "Load file has {} steps but the traces have {len}",
            load.len()
        ))
    );

    Ok(load)
}

/// Read a per-year load file, which must have the same number of steps as the traces.
///
/// The file may have a `Load` column or consist of a single column.
pub fn read_load(file_path: &Path, len: usize) -> Result<Vec<f64>> {
    read_load_internal(file_path, len).with_context(|| input_err_msg(file_path))
}
