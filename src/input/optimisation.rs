//! Code for reading the optimisation table.
use super::{Column, deserialise_non_negative, input_err_msg, parse_number_list, read_table};
use crate::error::PowermatchError;
use crate::facility::FacilityMap;
use crate::variable::{Approach, OptimisationVariable, VariableMap};
use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;
use std::path::Path;

/// Columns understood in the optimisation table
const OPTIMISATION_COLUMNS: &[Column] = &[
    Column {
        name: "name",
        aliases: &["Generator", "Facility"],
    },
    Column {
        name: "approach",
        aliases: &[],
    },
    Column {
        name: "capacity_min",
        aliases: &["Capacity Min", "Min Capacity"],
    },
    Column {
        name: "capacity_max",
        aliases: &["Capacity Max", "Max Capacity"],
    },
    Column {
        name: "capacity_step",
        aliases: &["Capacity Step", "Step"],
    },
    Column {
        name: "capacities",
        aliases: &["Values"],
    },
];

/// An optimisation record as it appears in the input table
#[derive(PartialEq, Debug, Deserialize)]
struct OptimisationRaw {
    name: String,
    #[serde(default)]
    approach: Option<String>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    capacity_min: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    capacity_max: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    capacity_step: Option<f64>,
    #[serde(default)]
    capacities: Option<String>,
}

impl OptimisationRaw {
    /// Convert into an [`OptimisationVariable`], checking it against the known facilities
    fn into_variable(self, facilities: &FacilityMap) -> Result<OptimisationVariable> {
        let (facility_id, facility) = facilities.get_key_value(self.name.as_str()).ok_or_else(|| {
            PowermatchError::validation(format!(
                "Optimisation entry for unknown generator {}",
                self.name
            ))
        })?;
        ensure!(
            facility.capacity > 0.0,
            PowermatchError::validation(format!(
                "Cannot optimise {facility_id}: its base capacity is zero"
            ))
        );

        let approach = self.approach.as_deref().unwrap_or("Range");
        let approach = if unicase::eq_ascii(approach, "discrete") {
            let values = parse_number_list(self.capacities.as_deref().unwrap_or_default())?;
            ensure!(
                !values.is_empty(),
                PowermatchError::validation(format!("No capacities listed for {facility_id}"))
            );
            ensure!(
                values.iter().all(|v| v.is_finite() && *v >= 0.0),
                PowermatchError::validation(format!(
                    "Capacities for {facility_id} must not be negative"
                ))
            );
            Approach::Discrete(values)
        } else if unicase::eq_ascii(approach, "range") {
            let min = self.capacity_min.unwrap_or(0.0);
            let max = self.capacity_max.unwrap_or(facility.capacity);
            ensure!(
                min <= max,
                PowermatchError::validation(format!(
                    "capacity_min ({min}) is greater than capacity_max ({max}) for {facility_id}"
                ))
            );
            Approach::Range {
                min,
                max,
                step: self.capacity_step.unwrap_or(0.0),
            }
        } else {
            bail!(PowermatchError::validation(format!(
                "Unknown optimisation approach {approach} for {facility_id}"
            )))
        };

        Ok(OptimisationVariable {
            facility_id: facility_id.clone(),
            approach,
        })
    }
}

/// Read optimisation variables from an iterator of raw records
fn read_variables_from_iter<I>(iter: I, facilities: &FacilityMap) -> Result<VariableMap>
where
    I: Iterator<Item = OptimisationRaw>,
{
    let mut variables = VariableMap::new();
    for raw in iter {
        let variable = raw.into_variable(facilities)?;
        let id = variable.facility_id.clone();
        ensure!(
            variables.insert(id.clone(), variable).is_none(),
            PowermatchError::validation(format!("Duplicate optimisation entry for {id}"))
        );
    }

    Ok(variables)
}

/// Read the optimisation table.
///
/// # Arguments
///
/// * `file_path` - Path to the optimisation CSV file
/// * `facilities` - All known facilities
///
/// # Returns
///
/// The optimisation variables in file order.
pub fn read_optimisation_variables(file_path: &Path, facilities: &FacilityMap) -> Result<VariableMap> {
    let raw = read_table::<OptimisationRaw>(file_path, OPTIMISATION_COLUMNS)?;
    read_variables_from_iter(raw.into_iter(), facilities).with_context(|| input_err_msg(file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::facilities;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn raw(name: &str, approach: &str) -> OptimisationRaw {
        OptimisationRaw {
            name: name.into(),
            approach: Some(approach.into()),
            capacity_min: Some(0.0),
            capacity_max: Some(200.0),
            capacity_step: Some(50.0),
            capacities: Some("10;20;30".into()),
        }
    }

    #[rstest]
    fn test_into_variable_range(facilities: FacilityMap) {
        let var = raw("Solar", "Range").into_variable(&facilities).unwrap();
        assert_eq!(
            var.approach,
            Approach::Range {
                min: 0.0,
                max: 200.0,
                step: 50.0
            }
        );
    }

    #[rstest]
    fn test_into_variable_discrete(facilities: FacilityMap) {
        let var = raw("Solar", "discrete").into_variable(&facilities).unwrap();
        assert_eq!(var.approach, Approach::Discrete(vec![10.0, 20.0, 30.0]));
    }

    #[rstest]
    fn test_into_variable_discrete_empty(facilities: FacilityMap) {
        let mut raw = raw("Solar", "Discrete");
        raw.capacities = None;
        assert!(raw.into_variable(&facilities).is_err());
    }

    #[rstest]
    fn test_into_variable_inverted_range(facilities: FacilityMap) {
        let mut raw = raw("Solar", "Range");
        raw.capacity_min = Some(300.0);
        assert!(raw.into_variable(&facilities).is_err());
    }

    #[rstest]
    #[case("Nuclear", "Range")] // unknown facility
    #[case("Solar", "Annealing")] // unknown approach
    fn test_into_variable_invalid(
        facilities: FacilityMap,
        #[case] name: &str,
        #[case] approach: &str,
    ) {
        assert!(raw(name, approach).into_variable(&facilities).is_err());
    }

    #[rstest]
    fn test_read_optimisation_variables(facilities: FacilityMap) {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("optimisation.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(
                file,
                "Name,Approach,Capacity Min,Capacity Max,Capacity Step,Capacities
Solar,Range,0,300,100,
Battery,Discrete,,,,0;10;20"
            )
            .unwrap();
        }

        let vars = read_optimisation_variables(&file_path, &facilities).unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["Solar"].values().unwrap(), [0.0, 100.0, 200.0, 300.0]);
        assert_eq!(vars["Battery"].approach, Approach::Discrete(vec![0.0, 10.0, 20.0]));
    }
}
