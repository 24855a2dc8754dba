//! Code for reading the generators table.
use super::{Column, deserialise_non_negative, deserialise_proportion, input_err_msg, read_table};
use crate::constraint::{Category, Constraint, ConstraintID, ConstraintMap};
use crate::error::PowermatchError;
use crate::facility::{DEFAULT_LIFETIME, Facility, FacilityID, FacilityMap};
use anyhow::{Context, Result, ensure};
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Columns understood in the generators table
const FACILITY_COLUMNS: &[Column] = &[
    Column {
        name: "name",
        aliases: &["Generator", "Facility", "Station"],
    },
    Column {
        name: "constraint",
        aliases: &["Technology"],
    },
    Column {
        name: "capacity",
        aliases: &["Capacity (MW)", "MW"],
    },
    Column {
        name: "lcoe",
        aliases: &["LCOE ($/MWh)", "Reference LCOE"],
    },
    Column {
        name: "lcoe_cf",
        aliases: &["LCOE CF", "Reference CF"],
    },
    Column {
        name: "emissions",
        aliases: &["Emissions (tCO2e/MWh)", "Emissions tCO2e/MWh"],
    },
    Column {
        name: "initial",
        aliases: &["Initial Value", "Initial Charge"],
    },
    Column {
        name: "capex",
        aliases: &["Capital Cost", "CAPEX", "Capex ($/kW)"],
    },
    Column {
        name: "fixed_om",
        aliases: &["FO&M", "Fixed O&M", "Fixed OM", "FOM"],
    },
    Column {
        name: "variable_om",
        aliases: &["VO&M", "Variable O&M", "Variable OM", "VOM"],
    },
    Column {
        name: "fuel",
        aliases: &["Fuel Cost"],
    },
    Column {
        name: "disc_rate",
        aliases: &["Discount Rate"],
    },
    Column {
        name: "lifetime",
        aliases: &["Lifetime (years)"],
    },
    Column {
        name: "area",
        aliases: &["Area (km2/MW)"],
    },
];

/// A generator record as it appears in the input table
#[derive(PartialEq, Debug, Deserialize)]
struct FacilityRaw {
    name: String,
    #[serde(default)]
    constraint: Option<String>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    capacity: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    lcoe: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    lcoe_cf: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    emissions: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    initial: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    capex: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    fixed_om: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    variable_om: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    fuel: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    disc_rate: Option<f64>,
    #[serde(default)]
    lifetime: Option<u32>,
    #[serde(default, deserialize_with = "deserialise_non_negative")]
    area: Option<f64>,
}

impl FacilityRaw {
    /// Resolve the constraint reference and apply defaults
    fn into_facility(self, constraints: &mut ConstraintMap) -> Result<Facility> {
        ensure!(
            !self.name.is_empty(),
            PowermatchError::validation("Generator with missing name")
        );
        let id = FacilityID::from(self.name);
        let constraint = resolve_constraint(&id, self.constraint.as_deref(), constraints)?;

        let lifetime = self.lifetime.unwrap_or(DEFAULT_LIFETIME);
        ensure!(
            lifetime > 0,
            PowermatchError::validation(format!("Lifetime of {id} must be greater than 0"))
        );

        Ok(Facility {
            id,
            constraint,
            capacity: self.capacity.unwrap_or(0.0),
            lcoe: self.lcoe.unwrap_or(0.0),
            lcoe_cf: self.lcoe_cf.unwrap_or(0.0),
            emissions: self.emissions.unwrap_or(0.0),
            initial: self.initial.unwrap_or(0.0),
            capex: self.capex.unwrap_or(0.0),
            fixed_om: self.fixed_om.unwrap_or(0.0),
            variable_om: self.variable_om.unwrap_or(0.0),
            fuel: self.fuel.unwrap_or(0.0),
            disc_rate: self.disc_rate,
            lifetime,
            area: self.area.unwrap_or(0.0),
        })
    }
}

/// Find the constraint a facility refers to.
///
/// A blank reference means the constraint with the facility's own name, if there is one;
/// otherwise a default renewable profile is created for it.
fn resolve_constraint(
    id: &FacilityID,
    reference: Option<&str>,
    constraints: &mut ConstraintMap,
) -> Result<ConstraintID> {
    if let Some(name) = reference.filter(|name| !name.is_empty()) {
        let (constraint_id, _) = constraints.get_key_value(name).ok_or_else(|| {
            PowermatchError::validation(format!(
                "Generator {id} refers to unknown constraint {name}"
            ))
        })?;
        return Ok(constraint_id.clone());
    }

    if let Some((constraint_id, _)) = constraints.get_key_value(id.as_str()) {
        return Ok(constraint_id.clone());
    }

    debug!("No constraint given for {id}; treating it as renewable");
    let constraint_id = ConstraintID::new(id.as_str());
    constraints.insert(
        constraint_id.clone(),
        Constraint::new(constraint_id.clone(), Category::Renewable),
    );
    Ok(constraint_id)
}

/// Read facilities from an iterator of raw records
fn read_facilities_from_iter<I>(iter: I, constraints: &mut ConstraintMap) -> Result<FacilityMap>
where
    I: Iterator<Item = FacilityRaw>,
{
    let mut facilities = FacilityMap::new();
    for raw in iter {
        let facility = raw.into_facility(constraints)?;
        let id = facility.id.clone();
        ensure!(
            facilities.insert(id.clone(), facility).is_none(),
            PowermatchError::validation(format!("Duplicate generator {id}"))
        );
    }

    Ok(facilities)
}

/// Read the generators table.
///
/// # Arguments
///
/// * `file_path` - Path to the generators CSV file
/// * `constraints` - Known constraints. Default profiles are added for facilities without one.
///
/// # Returns
///
/// A map of facilities in file order.
pub fn read_facilities(file_path: &Path, constraints: &mut ConstraintMap) -> Result<FacilityMap> {
    let raw = read_table::<FacilityRaw>(file_path, FACILITY_COLUMNS)?;
    read_facilities_from_iter(raw.into_iter(), constraints)
        .with_context(|| input_err_msg(file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, error_kind};
    use crate::fixture::constraints;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn raw(name: &str, constraint: Option<&str>) -> FacilityRaw {
        FacilityRaw {
            name: name.into(),
            constraint: constraint.map(Into::into),
            capacity: Some(10.0),
            lcoe: None,
            lcoe_cf: None,
            emissions: None,
            initial: None,
            capex: None,
            fixed_om: None,
            variable_om: None,
            fuel: None,
            disc_rate: None,
            lifetime: None,
            area: None,
        }
    }

    #[rstest]
    fn test_into_facility_defaults(mut constraints: ConstraintMap) {
        let facility = raw("Gas 1", Some("Gas")).into_facility(&mut constraints).unwrap();
        assert_eq!(
            facility,
            Facility::new("Gas 1".into(), "Gas".into(), 10.0)
        );
        assert_eq!(facility.lifetime, DEFAULT_LIFETIME);
    }

    #[rstest]
    fn test_into_facility_unknown_constraint(mut constraints: ConstraintMap) {
        let err = raw("Gas 1", Some("Hydrogen"))
            .into_facility(&mut constraints)
            .unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Validation);
    }

    #[rstest]
    fn test_into_facility_own_name_constraint(mut constraints: ConstraintMap) {
        let facility = raw("Battery", None).into_facility(&mut constraints).unwrap();
        assert_eq!(facility.constraint, ConstraintID::new("Battery"));
    }

    #[rstest]
    fn test_into_facility_default_renewable(mut constraints: ConstraintMap) {
        let facility = raw("Rooftop PV", None).into_facility(&mut constraints).unwrap();
        assert_eq!(constraints[&facility.constraint].category, Category::Renewable);
    }

    #[rstest]
    fn test_into_facility_zero_lifetime(mut constraints: ConstraintMap) {
        let mut raw = raw("Gas 1", Some("Gas"));
        raw.lifetime = Some(0);
        assert!(raw.into_facility(&mut constraints).is_err());
    }

    #[rstest]
    fn test_read_facilities_duplicate(mut constraints: ConstraintMap) {
        let iter = [raw("Gas 1", Some("Gas")), raw("Gas 1", Some("Gas"))].into_iter();
        assert!(read_facilities_from_iter(iter, &mut constraints).is_err());
    }

    #[rstest]
    fn test_read_facilities(mut constraints: ConstraintMap) {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("generators.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(
                file,
                "Name,Constraint,Capacity,Capital Cost,FO&M,VO&M,Emissions,Lifetime,Order
Solar,Solar,100,1200,15,,0,25,1
Gas,Gas,50,900,10,5,0.5,,2"
            )
            .unwrap();
        }

        let facilities = read_facilities(&file_path, &mut constraints).unwrap();
        assert_eq!(facilities.len(), 2);
        let solar = &facilities["Solar"];
        assert_eq!(solar.capex, 1200.0);
        assert_eq!(solar.fixed_om, 15.0);
        assert_eq!(solar.lifetime, 25);
        let gas = &facilities["Gas"];
        assert_eq!(gas.variable_om, 5.0);
        assert_eq!(gas.emissions, 0.5);
        assert_eq!(gas.lifetime, DEFAULT_LIFETIME);
    }

    #[rstest]
    fn test_read_facilities_negative_capacity(mut constraints: ConstraintMap) {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("generators.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "name,constraint,capacity\nGas,Gas,-5").unwrap();
        }

        assert!(read_facilities(&file_path, &mut constraints).is_err());
    }
}
