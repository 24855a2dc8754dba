//! Capacity multipliers applied to the base fleet before a simulation.
use crate::error::PowermatchError;
use crate::facility::{FacilityID, FacilityMap};
use crate::id::IDCollection;
use crate::input::trace::LOAD_COLUMN;
use anyhow::{Result, ensure};
use indexmap::IndexMap;

/// Multipliers on facility capacities and on the load trace.
///
/// Facilities without an explicit multiplier keep their base capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustments {
    load: Option<f64>,
    multipliers: IndexMap<FacilityID, f64>,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            load: None,
            multipliers: IndexMap::new(),
        }
    }
}

/// Check that a multiplier is a finite, non-negative number
fn check_multiplier(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        PowermatchError::validation(format!(
            "Capacity multiplier for {name} must be a non-negative number, got {value}"
        ))
    );

    Ok(())
}

impl Adjustments {
    /// Build adjustments from multipliers keyed by name.
    ///
    /// The key `Load` (any case) sets the load multiplier. Any other key must name a facility.
    pub fn from_named<'a, I>(named: I, facilities: &FacilityMap) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut adjustments = Self::default();
        for (name, value) in named {
            if unicase::eq_ascii(name, LOAD_COLUMN) {
                adjustments.set_load(value)?;
                continue;
            }

            let id = facilities.get_id_by_str(name).map_err(|_| {
                PowermatchError::config(format!("Capacity adjustment for unknown generator {name}"))
            })?;
            adjustments.set(id, value)?;
        }

        Ok(adjustments)
    }

    /// The multiplier for a facility (1 unless set)
    pub fn multiplier(&self, id: &FacilityID) -> f64 {
        self.multipliers.get(id).copied().unwrap_or(1.0)
    }

    /// The multiplier applied to the load trace (1 unless set)
    pub fn load(&self) -> f64 {
        self.load.unwrap_or(1.0)
    }

    /// Set the load multiplier
    pub fn set_load(&mut self, value: f64) -> Result<()> {
        check_multiplier(LOAD_COLUMN, value)?;
        self.load = Some(value);

        Ok(())
    }

    /// Set the multiplier for a facility
    pub fn set(&mut self, id: FacilityID, value: f64) -> Result<()> {
        check_multiplier(id.as_str(), value)?;
        self.multipliers.insert(id, value);

        Ok(())
    }

    /// Layer other adjustments on top of these, with `other` taking precedence.
    ///
    /// Anything `other` sets explicitly wins, including a load multiplier of 1.
    pub fn overridden_by(&self, other: &Adjustments) -> Adjustments {
        let mut merged = self.clone();
        merged
            .multipliers
            .extend(other.multipliers.iter().map(|(id, m)| (id.clone(), *m)));
        if other.load.is_some() {
            merged.load = other.load;
        }

        merged
    }

    /// The explicitly set multipliers, in the order they were set
    pub fn iter(&self) -> impl Iterator<Item = (&FacilityID, f64)> {
        self.multipliers.iter().map(|(id, m)| (id, *m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, error_kind};
    use crate::fixture::facilities;
    use rstest::rstest;

    #[rstest]
    fn test_from_named(facilities: FacilityMap) {
        let adjustments =
            Adjustments::from_named([("Solar", 2.0), ("load", 1.5)], &facilities).unwrap();
        assert_eq!(adjustments.multiplier(&"Solar".into()), 2.0);
        assert_eq!(adjustments.multiplier(&"Gas".into()), 1.0);
        assert_eq!(adjustments.load(), 1.5);
    }

    #[rstest]
    fn test_from_named_unknown(facilities: FacilityMap) {
        let err = Adjustments::from_named([("Nuclear", 2.0)], &facilities).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Config);
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_set_invalid(#[case] value: f64) {
        let err = Adjustments::default().set("Solar".into(), value).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Validation);
    }

    #[test]
    fn test_overridden_by() {
        let mut base = Adjustments::default();
        base.set("Solar".into(), 2.0).unwrap();
        base.set("Wind".into(), 3.0).unwrap();
        base.set_load(1.2).unwrap();
        let mut other = Adjustments::default();
        other.set("Wind".into(), 0.0).unwrap();

        let merged = base.overridden_by(&other);
        assert_eq!(merged.multiplier(&"Solar".into()), 2.0);
        assert_eq!(merged.multiplier(&"Wind".into()), 0.0);
        assert_eq!(merged.load(), 1.2);
    }

    #[test]
    fn test_overridden_by_explicit_unit_load() {
        let mut base = Adjustments::default();
        base.set_load(1.2).unwrap();
        let mut other = Adjustments::default();
        other.set_load(1.0).unwrap();

        assert_eq!(base.overridden_by(&other).load(), 1.0);
    }

    #[test]
    fn test_set_load_invalid() {
        let err = Adjustments::default().set_load(-0.5).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Validation);
    }
}
