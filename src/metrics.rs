//! Costs, emissions and summary statistics derived from a simulation.
use crate::constraint::Category;
use crate::dispatch::{DispatchOutcome, DispatchRecord};
use crate::facility::{Facility, FacilityID, FacilityMap};
use crate::finance::{annual_capital_cost, levelised_cost, per_kw_to_per_mw, reference_annual_cost};
use crate::trace::HOURS_PER_YEAR;
use crate::units::{
    Capacity, Dimensionless, EmissionsPerEnergy, Energy, Money, MoneyPerEmissions, MoneyPerEnergy,
};
use anyhow::{Context, Result};
use serde::Serialize;

/// Economic parameters shared by every facility
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostParameters {
    /// Discount rate for facilities without their own
    pub discount_rate: f64,
    /// Carbon price ($/tCO₂e)
    pub carbon_price: f64,
}

/// Annual results for one facility
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityMetrics {
    /// Name of the facility
    pub name: FacilityID,
    /// The kind of technology
    pub category: Category,
    /// Effective capacity (MW, or MWh for storage)
    pub capacity: f64,
    /// Energy produced (MWh); for storage, energy delivered to load
    pub generation: f64,
    /// Energy delivered to load (MWh)
    pub to_load: f64,
    /// Fraction of the time the facility would have to run flat out to produce `generation`
    pub capacity_factor: f64,
    /// Annual cost ($)
    pub cost: f64,
    /// Share of the total system cost
    pub cost_share: f64,
    /// Levelised cost ($/MWh)
    pub lcoe: f64,
    /// Emissions (tCO₂e)
    pub emissions: f64,
    /// Cost of emissions at the carbon price ($)
    pub emissions_cost: f64,
    /// Land area (km²)
    pub area: f64,
    /// Reference LCOE from the generator table ($/MWh)
    pub reference_lcoe: f64,
    /// Reference capacity factor from the generator table
    pub reference_cf: f64,
    /// Energy available but neither delivered nor stored (MWh)
    pub curtailed: f64,
    /// Surplus energy consumed by charging (MWh)
    pub charged: f64,
}

/// Annual results for the whole system
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SystemMetrics {
    /// Total load (MWh)
    pub load: f64,
    /// Load served (MWh)
    pub served: f64,
    /// Total energy produced, including output beyond the load (MWh)
    pub generation: f64,
    /// Load not served (MWh)
    pub shortfall: f64,
    /// Energy left over after serving load and charging storage (MWh)
    pub surplus: f64,
    /// Renewable energy neither served nor stored (MWh)
    pub curtailed: f64,
    /// Energy consumed by storage charging (MWh)
    pub charged: f64,
    /// Energy lost by storage (MWh)
    pub storage_losses: f64,
    /// Total annual cost ($)
    pub cost: f64,
    /// System levelised cost ($/MWh); infinite when no load is served
    pub lcoe: f64,
    /// Total emissions (tCO₂e)
    pub co2: f64,
    /// Cost of emissions at the carbon price ($)
    pub carbon_cost: f64,
    /// Fraction of served load met by renewables and storage
    pub re_pct: f64,
    /// Fraction of load served
    pub load_pct: f64,
    /// Surplus as a fraction of load
    pub surplus_pct: f64,
    /// Total land area (km²)
    pub area: f64,
    /// Highest load (MW)
    pub peak_load: f64,
    /// Highest shortfall (MW)
    pub peak_shortfall: f64,
    /// Hours in which some load was not served
    pub shortfall_hours: f64,
}

/// Results for one facility and one system
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Per-facility results, in dispatch order
    pub facilities: Vec<FacilityMetrics>,
    /// System totals
    pub system: SystemMetrics,
}

/// The annual cost of a facility at the given capacity and output.
///
/// With a capital cost, this is the annualised capital cost plus fixed, variable, fuel and
/// emissions costs. Without one, a reference LCOE at a reference capacity factor stands in for
/// everything but the emissions cost.
pub fn facility_cost(
    facility: &Facility,
    capacity: Capacity,
    generation: Energy,
    params: &CostParameters,
) -> Money {
    let intensity = EmissionsPerEnergy(facility.emissions);
    let emissions_cost = MoneyPerEmissions(params.carbon_price) * (intensity * generation);

    if facility.capex == 0.0 && facility.lcoe > 0.0 && facility.lcoe_cf > 0.0 {
        return reference_annual_cost(
            MoneyPerEnergy(facility.lcoe),
            capacity,
            Dimensionless(facility.lcoe_cf),
            HOURS_PER_YEAR,
        ) + emissions_cost;
    }

    let discount_rate = Dimensionless(facility.discount_rate(params.discount_rate));
    let capital = annual_capital_cost(
        per_kw_to_per_mw(facility.capex),
        capacity,
        facility.lifetime,
        discount_rate,
    );
    let fixed = per_kw_to_per_mw(facility.fixed_om) * capacity;
    let running = MoneyPerEnergy(facility.variable_om + facility.fuel) * generation;

    capital + fixed + running + emissions_cost
}

fn facility_metrics(
    facility: &Facility,
    record: &DispatchRecord,
    hours: f64,
    params: &CostParameters,
) -> FacilityMetrics {
    let generation = record.total_output();
    let capacity = record.capacity;
    let cost = facility_cost(facility, Capacity(capacity), Energy(generation), params);
    let emissions = EmissionsPerEnergy(facility.emissions) * Energy(generation);
    let capacity_factor = if capacity > 0.0 && hours > 0.0 {
        generation / (capacity * hours)
    } else {
        0.0
    };

    FacilityMetrics {
        name: record.id.clone(),
        category: record.category,
        capacity,
        generation,
        to_load: record.total_dispatched(),
        capacity_factor,
        cost: cost.value(),
        cost_share: 0.0,
        lcoe: levelised_cost(cost, Energy(generation)).value(),
        emissions: emissions.value(),
        emissions_cost: (MoneyPerEmissions(params.carbon_price) * emissions).value(),
        area: facility.area * capacity,
        reference_lcoe: facility.lcoe,
        reference_cf: facility.lcoe_cf,
        curtailed: record.curtailed.iter().sum(),
        charged: record.charged.iter().sum(),
    }
}

/// Divide, treating a zero denominator as giving `default`
fn ratio(numerator: f64, denominator: f64, default: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        default
    }
}

/// Calculate facility and system metrics for a simulation.
///
/// # Arguments
///
/// * `outcome` - The results of [`crate::dispatch::dispatch`]
/// * `facilities` - Cost data for every facility in the outcome
/// * `params` - Economic parameters
pub fn calculate_metrics(
    outcome: &DispatchOutcome,
    facilities: &FacilityMap,
    params: &CostParameters,
) -> Result<Metrics> {
    let step_hours = outcome.resolution.step_hours();
    let hours = outcome.load.len() as f64 * step_hours;

    let mut facility_metrics = outcome
        .records
        .iter()
        .map(|record| {
            let facility = facilities
                .get(&record.id)
                .with_context(|| format!("No cost data for {}", record.id))?;
            Ok(facility_metrics(facility, record, hours, params))
        })
        .collect::<Result<Vec<_>>>()?;

    let load: f64 = outcome.load.iter().sum();
    let shortfall: f64 = outcome.shortfall.iter().sum();
    let served = load - shortfall;
    let cost: f64 = facility_metrics.iter().map(|m| m.cost).sum();
    for metrics in &mut facility_metrics {
        metrics.cost_share = ratio(metrics.cost, cost, 0.0);
    }

    let curtailed: f64 = facility_metrics
        .iter()
        .filter(|m| m.category != Category::Storage)
        .map(|m| m.curtailed)
        .sum();
    let charged: f64 = facility_metrics.iter().map(|m| m.charged).sum();
    let renewable_served: f64 = outcome
        .records
        .iter()
        .filter(|r| matches!(r.category, Category::Renewable | Category::Storage))
        .map(DispatchRecord::total_dispatched)
        .sum();
    let surplus: f64 = outcome.surplus.iter().sum();
    let co2: f64 = facility_metrics.iter().map(|m| m.emissions).sum();
    let peak = |values: &[f64]| values.iter().copied().fold(0.0, f64::max) / step_hours;

    let system = SystemMetrics {
        load,
        served,
        generation: facility_metrics
            .iter()
            .filter(|m| m.category != Category::Storage)
            .map(|m| m.generation)
            .sum(),
        shortfall,
        surplus,
        curtailed,
        charged,
        storage_losses: outcome.records.iter().map(|r| r.losses).sum(),
        cost,
        lcoe: if served > 0.0 { cost / served } else { f64::INFINITY },
        co2,
        carbon_cost: co2 * params.carbon_price,
        re_pct: ratio(renewable_served, served, 0.0),
        load_pct: 1.0 - ratio(shortfall, load, 0.0),
        surplus_pct: ratio(surplus, load, 0.0),
        area: facility_metrics.iter().map(|m| m.area).sum(),
        peak_load: peak(&outcome.load),
        peak_shortfall: peak(&outcome.shortfall),
        shortfall_hours: outcome.shortfall.iter().filter(|s| **s > 0.0).count() as f64
            * step_hours,
    };

    Ok(Metrics {
        facilities: facility_metrics,
        system,
    })
}
