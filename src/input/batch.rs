//! Code for reading the batch sheet of capacity multipliers.
use super::input_err_msg;
use crate::adjustment::Adjustments;
use crate::error::PowermatchError;
use crate::facility::FacilityMap;
use anyhow::{Context, Result, ensure};
use std::path::Path;

/// One column of the batch sheet
#[derive(Debug, Clone, PartialEq)]
pub struct BatchScenario {
    /// The column header, or a generated name if the header is blank
    pub name: String,
    /// Multipliers for this scenario
    pub adjustments: Adjustments,
}

/// Parse one multiplier cell. Blank cells mean "unchanged".
fn parse_multiplier(cell: &str, name: &str, scenario: &str) -> Result<f64> {
    if cell.is_empty() {
        return Ok(1.0);
    }

    cell.parse::<f64>().map_err(|_| {
        PowermatchError::validation(format!(
            "Invalid multiplier '{cell}' for {name} in scenario {scenario}"
        ))
        .into()
    })
}

fn read_batch_internal(file_path: &Path, facilities: &FacilityMap) -> Result<Vec<BatchScenario>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(file_path)?;
    let names: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, header)| {
            if header.is_empty() {
                format!("Scenario {i}")
            } else {
                header.to_string()
            }
        })
        .collect();
    ensure!(
        !names.is_empty(),
        PowermatchError::data_shape("Batch sheet has no scenario columns")
    );

    // Gather (name, multiplier) pairs per scenario column before validating them all at once
    let mut columns: Vec<Vec<(String, f64)>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record?;
        let Some(row_name) = record.get(0).filter(|name| !name.is_empty()) else {
            continue;
        };
        for (i, (column, scenario)) in columns.iter_mut().zip(&names).enumerate() {
            let cell = record.get(i + 1).unwrap_or_default();
            column.push((row_name.to_string(), parse_multiplier(cell, row_name, scenario)?));
        }
    }

    names
        .into_iter()
        .zip(columns)
        .map(|(name, column)| {
            let adjustments = Adjustments::from_named(
                column.iter().map(|(n, m)| (n.as_str(), *m)),
                facilities,
            )
            .with_context(|| format!("Invalid batch scenario {name}"))?;
            Ok(BatchScenario { name, adjustments })
        })
        .collect()
}

/// Read the batch sheet.
///
/// The first column names a facility (or `Load`). Each further column is one scenario, headed
/// by its name, holding capacity multipliers. Blank cells leave the multiplier at 1.
///
/// # Arguments
///
/// * `file_path` - Path to the batch CSV file
/// * `facilities` - All known facilities
pub fn read_batch(file_path: &Path, facilities: &FacilityMap) -> Result<Vec<BatchScenario>> {
    read_batch_internal(file_path, facilities).with_context(|| input_err_msg(file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, error_kind};
    use crate::fixture::facilities;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_batch(dir: &Path, contents: &str) -> PathBuf {
        let file_path = dir.join("batch.csv");
        let mut file = File::create(&file_path).unwrap();
        write!(file, "{contents}").unwrap();
        file_path
    }

    #[rstest]
    fn test_read_batch(facilities: FacilityMap) {
        let dir = tempdir().unwrap();
        let file_path = write_batch(
            dir.path(),
            "Name,Low,,High\nSolar,0.5,1,2\nGas,,1,\nLoad,1,1,1.1\n",
        );
        let scenarios = read_batch(&file_path, &facilities).unwrap();
        assert_eq!(scenarios.len(), 3);
        assert_eq!(scenarios[0].name, "Low");
        assert_eq!(scenarios[1].name, "Scenario 2");
        assert_eq!(scenarios[0].adjustments.multiplier(&"Solar".into()), 0.5);
        assert_eq!(scenarios[0].adjustments.multiplier(&"Gas".into()), 1.0);
        assert_eq!(scenarios[2].adjustments.load(), 1.1);
        assert_eq!(scenarios[0].adjustments.load(), 1.0);
    }

    #[rstest]
    fn test_read_batch_unknown_facility(facilities: FacilityMap) {
        let dir = tempdir().unwrap();
        let file_path = write_batch(dir.path(), "Name,A\nNuclear,2\n");
        let err = read_batch(&file_path, &facilities).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Config);
    }

    #[rstest]
    fn test_read_batch_bad_value(facilities: FacilityMap) {
        let dir = tempdir().unwrap();
        let file_path = write_batch(dir.path(), "Name,A\nSolar,lots\n");
        let err = read_batch(&file_path, &facilities).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Validation);
    }
}
