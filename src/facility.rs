//! Facilities are the named plant instances making up a fleet.
use crate::constraint::ConstraintID;
use crate::id::{define_id_getter, define_id_type};
use indexmap::IndexMap;

define_id_type! {FacilityID}

/// A map of [`Facility`]s, keyed by name, in the order they were loaded
pub type FacilityMap = IndexMap<FacilityID, Facility>;

/// The default economic lifetime of a facility, in years
pub const DEFAULT_LIFETIME: u32 = 20;

/// A plant instance with its capacity and costs
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    /// Name of the facility
    pub id: FacilityID,
    /// The operating profile the facility follows
    pub constraint: ConstraintID,
    /// Capacity in MW (MWh for storage)
    pub capacity: f64,
    /// Reference LCOE ($/MWh), used when no capital cost is given
    pub lcoe: f64,
    /// Capacity factor at which `lcoe` applies
    pub lcoe_cf: f64,
    /// Emissions intensity (tCO₂e/MWh)
    pub emissions: f64,
    /// Initial state of charge for storage (MWh)
    pub initial: f64,
    /// Capital cost ($/kW)
    pub capex: f64,
    /// Fixed operating and maintenance cost ($/kW/year)
    pub fixed_om: f64,
    /// Variable operating and maintenance cost ($/MWh)
    pub variable_om: f64,
    /// Fuel cost ($/MWh)
    pub fuel: f64,
    /// Discount rate overriding the global rate
    pub disc_rate: Option<f64>,
    /// Economic lifetime in years
    pub lifetime: u32,
    /// Land area (km²/MW)
    pub area: f64,
}
define_id_getter! {Facility, FacilityID}

impl Facility {
    /// A facility with the given capacity and no costs
    pub fn new(id: FacilityID, constraint: ConstraintID, capacity: f64) -> Self {
        Self {
            id,
            constraint,
            capacity,
            lcoe: 0.0,
            lcoe_cf: 0.0,
            emissions: 0.0,
            initial: 0.0,
            capex: 0.0,
            fixed_om: 0.0,
            variable_om: 0.0,
            fuel: 0.0,
            disc_rate: None,
            lifetime: DEFAULT_LIFETIME,
            area: 0.0,
        }
    }

    /// The discount rate to use, falling back on the global rate
    pub fn discount_rate(&self, global: f64) -> f64 {
        self.disc_rate.unwrap_or(global)
    }
}
