//! The state of charge of a storage facility.
use crate::constraint::Constraint;

/// What a storage facility did in one step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StorageStep {
    /// State of charge at the start of the step
    pub opening: f64,
    /// Energy delivered to load
    pub delivered: f64,
    /// Surplus energy consumed while charging
    pub consumed: f64,
    /// Energy lost to parasitic, charging and discharging losses
    pub losses: f64,
}

/// Tracks the charge held by a storage facility.
///
/// Rates are converted to energy per step when the state is created.
#[derive(Debug, Clone)]
pub struct StorageState {
    capacity: f64,
    /// Fraction of stored energy lost each step
    parasitic: f64,
    recharge_max: f64,
    recharge_efficiency: f64,
    recharge_start: f64,
    discharge_max: f64,
    discharge_efficiency: f64,
    discharge_start: f64,
    soc: f64,
}

impl StorageState {
    /// Create a storage facility holding `initial` MWh (capped at its capacity)
    pub fn new(constraint: &Constraint, capacity: f64, initial: f64, steps_per_hour: u32) -> Self {
        let step_hours = 1.0 / f64::from(steps_per_hour);
        Self {
            capacity,
            parasitic: 1.0 - (1.0 - constraint.parasitic_loss).powf(step_hours),
            recharge_max: constraint.recharge_max * capacity * step_hours,
            recharge_efficiency: 1.0 - constraint.recharge_loss,
            recharge_start: constraint.recharge_start * capacity,
            discharge_max: constraint.discharge_max * capacity * step_hours,
            discharge_efficiency: 1.0 - constraint.discharge_loss,
            discharge_start: constraint.discharge_start * capacity,
            soc: initial.clamp(0.0, capacity),
        }
    }

    /// The current state of charge
    pub fn soc(&self) -> f64 {
        self.soc
    }

    /// Run one step, discharging into the remaining load or else charging from the surplus.
    ///
    /// Charging only happens when there is no remaining load.
    pub fn step(&mut self, remaining: f64, surplus: f64) -> StorageStep {
        let opening = self.soc;
        let mut step = StorageStep {
            opening,
            ..Default::default()
        };

        let decay = self.soc * self.parasitic;
        self.soc -= decay;
        step.losses += decay;

        if remaining > 0.0 {
            if self.soc > 0.0 && self.soc >= self.discharge_start {
                let discharge = (remaining / self.discharge_efficiency)
                    .min(self.soc)
                    .min(self.discharge_max);
                let delivered = (discharge * self.discharge_efficiency).min(remaining);
                self.soc = (self.soc - discharge).max(0.0);
                step.delivered = delivered;
                step.losses += discharge - delivered;
            }
        } else if surplus > 0.0 && self.soc <= self.recharge_start {
            let recharge = (surplus * self.recharge_efficiency)
                .min(self.capacity - self.soc)
                .min(self.recharge_max);
            if recharge > 0.0 {
                let consumed = (recharge / self.recharge_efficiency).min(surplus);
                self.soc = (self.soc + recharge).min(self.capacity);
                step.consumed = consumed;
                step.losses += consumed - recharge;
            }
        }

        step
    }
}
