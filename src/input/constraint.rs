//! Code for reading the constraints table.
use super::{Column, deserialise_proportion, input_err_msg, read_table};
use crate::constraint::{Category, Constraint, ConstraintID, ConstraintMap};
use crate::error::PowermatchError;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

/// Columns understood in the constraints table
const CONSTRAINT_COLUMNS: &[Column] = &[
    Column {
        name: "name",
        aliases: &["Constraint", "Technology"],
    },
    Column {
        name: "category",
        aliases: &["Type"],
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
        name: "rampup_max",
        aliases: &["Ramp Up Max", "Rampup Max", "Ramp Up"],
    },
    Column {
        name: "rampdown_max",
        aliases: &["Ramp Down Max", "Rampdown Max", "Ramp Down"],
    },
    Column {
        name: "recharge_max",
        aliases: &["Recharge Max"],
    },
    Column {
        name: "recharge_loss",
        aliases: &["Recharge Loss"],
    },
    Column {
        name: "recharge_start",
        aliases: &["Recharge Start"],
    },
    Column {
        name: "discharge_max",
        aliases: &["Discharge Max"],
    },
    Column {
        name: "discharge_loss",
        aliases: &["Discharge Loss"],
    },
    Column {
        name: "discharge_start",
        aliases: &["Discharge Start"],
    },
    Column {
        name: "parasitic_loss",
        aliases: &["Parasitic Loss"],
    },
    Column {
        name: "min_run_time",
        aliases: &["Min Run Time", "Minimum Run Time"],
    },
    Column {
        name: "warm_time",
        aliases: &["Warm Time", "Warmup Time"],
    },
];

/// A constraint record as it appears in the input table
#[derive(PartialEq, Debug, Deserialize)]
struct ConstraintRaw {
    name: String,
    #[serde(default)]
    category: Category,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    capacity_min: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    capacity_max: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    rampup_max: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    rampdown_max: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    recharge_max: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    recharge_loss: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    recharge_start: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    discharge_max: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    discharge_loss: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    discharge_start: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    parasitic_loss: Option<f64>,
    #[serde(default)]
    min_run_time: Option<u32>,
    #[serde(default)]
    warm_time: Option<u32>,
}

impl ConstraintRaw {
    /// Apply defaults and check bounds
    fn into_constraint(self) -> Result<Constraint> {
        ensure!(
            !self.name.is_empty(),
            PowermatchError::validation("Constraint with missing name")
        );

        let mut constraint = Constraint::new(ConstraintID::from(self.name), self.category);
        let id = constraint.id.clone();
        let set = |field: &mut f64, value: Option<f64>| {
            if let Some(value) = value {
                *field = value;
            }
        };
        set(&mut constraint.capacity_min, self.capacity_min);
        set(&mut constraint.capacity_max, self.capacity_max);
        set(&mut constraint.rampup_max, self.rampup_max);
        set(&mut constraint.rampdown_max, self.rampdown_max);
        set(&mut constraint.recharge_max, self.recharge_max);
        set(&mut constraint.recharge_loss, self.recharge_loss);
        set(&mut constraint.recharge_start, self.recharge_start);
        set(&mut constraint.discharge_max, self.discharge_max);
        set(&mut constraint.discharge_loss, self.discharge_loss);
        set(&mut constraint.discharge_start, self.discharge_start);
        set(&mut constraint.parasitic_loss, self.parasitic_loss);
        constraint.min_run_time = self.min_run_time.unwrap_or(0);
        constraint.warm_time = self.warm_time.unwrap_or(0);

        validate_constraint(&constraint).with_context(|| format!("Invalid constraint {id}"))?;

        Ok(constraint)
    }
}

/// Check the relationships between a constraint's fields
fn validate_constraint(constraint: &Constraint) -> Result<()> {
    ensure!(
        constraint.capacity_min <= constraint.capacity_max,
        PowermatchError::validation(format!(
            "capacity_min ({}) is greater than capacity_max ({})",
            constraint.capacity_min, constraint.capacity_max
        ))
    );
    ensure!(
        constraint.rampup_max > 0.0 && constraint.rampdown_max > 0.0,
        PowermatchError::validation("Ramp limits must be greater than zero")
    );
    ensure!(
        constraint.recharge_loss < 1.0 && constraint.discharge_loss < 1.0,
        PowermatchError::validation("Recharge and discharge losses must be less than 1")
    );
    ensure!(
        constraint.parasitic_loss < 1.0,
        PowermatchError::validation("parasitic_loss must be less than 1")
    );

    Ok(())
}

/// Read constraints from an iterator of raw records
fn read_constraints_from_iter<I>(iter: I) -> Result<ConstraintMap>
where
    I: Iterator<Item = ConstraintRaw>,
{
    let mut constraints = ConstraintMap::new();
    for raw in iter {
        let constraint = raw.into_constraint()?;
        let id = constraint.id.clone();
        ensure!(
            constraints.insert(id.clone(), constraint).is_none(),
            PowermatchError::validation(format!("Duplicate constraint {id}"))
        );
    }

    Ok(constraints)
}

/// Read the constraints table.
///
/// # Arguments
///
/// * `file_path` - Path to the constraints CSV file
///
/// # Returns
///
/// A map of constraints in file order.
pub fn read_constraints(file_path: &Path) -> Result<ConstraintMap> {
    let raw = read_table::<ConstraintRaw>(file_path, CONSTRAINT_COLUMNS)?;
    read_constraints_from_iter(raw.into_iter()).with_context(|| input_err_msg(file_path))
}
