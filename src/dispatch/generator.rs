//! The run state of a dispatchable generator.
use crate::constraint::Constraint;

/// What a generator did in one step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeneratorStep {
    /// Total energy produced
    pub output: f64,
    /// Energy delivered to load
    pub to_load: f64,
    /// Energy produced beyond the remaining load (forced or ramp-held output)
    pub excess: f64,
}

/// Tracks whether a generator is running and for how long.
///
/// Rates are converted to energy per step when the state is created, so the same logic serves
/// hourly and half-hourly traces.
#[derive(Debug, Clone)]
pub struct GeneratorState {
    /// Maximum output per step once warm
    nominal: f64,
    /// Output per step while held on by the minimum run time
    forced: f64,
    /// Maximum increase in output per step
    ramp_up: f64,
    /// Maximum decrease in output per step
    ramp_down: f64,
    /// Steps of reduced output after a start
    warm_steps: u32,
    /// Steps a generator stays on once started
    min_run_steps: u32,
    running: bool,
    hours_on: u32,
    previous: f64,
}

impl GeneratorState {
    /// Create a stopped generator
    pub fn new(constraint: &Constraint, capacity: f64, steps_per_hour: u32) -> Self {
        let step_hours = 1.0 / f64::from(steps_per_hour);
        Self {
            nominal: capacity * constraint.capacity_max * step_hours,
            forced: capacity * constraint.capacity_min * step_hours,
            ramp_up: capacity * constraint.rampup_max * step_hours,
            ramp_down: capacity * constraint.rampdown_max * step_hours,
            warm_steps: constraint.warm_time * steps_per_hour,
            min_run_steps: constraint.min_run_time * steps_per_hour,
            running: false,
            hours_on: 0,
            previous: 0.0,
        }
    }

    /// Steps since the generator last started (0 when stopped)
    pub fn hours_on(&self) -> u32 {
        self.hours_on
    }

    /// Output available this step, allowing for warm-up
    fn available(&self) -> f64 {
        if self.hours_on >= self.warm_steps {
            self.nominal
        } else {
            self.nominal * f64::from(self.hours_on) / f64::from(self.warm_steps)
        }
    }

    /// Offer the generator the remaining load for one step
    pub fn step(&mut self, remaining: f64) -> GeneratorStep {
        let demand = remaining > 0.0;
        if !self.running {
            if !(demand && self.nominal > 0.0) {
                return GeneratorStep::default();
            }
            self.running = true;
            self.hours_on = 0;
        }

        let mut target = self.available().min(remaining);
        let held_on = self.hours_on > 0 && self.hours_on < self.min_run_steps;
        if held_on {
            target = target.max(self.forced);
        }
        let low = (self.previous - self.ramp_down).max(0.0);
        let high = self.previous + self.ramp_up;
        let output = target.clamp(low, high);

        let to_load = output.min(remaining);
        self.previous = output;
        if output > 0.0 || demand || held_on {
            self.hours_on += 1;
        } else {
            self.running = false;
            self.hours_on = 0;
        }

        GeneratorStep {
            output,
            to_load,
            excess: output - to_load,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Category;
    use float_cmp::assert_approx_eq;

    fn generator(f: impl FnOnce(&mut Constraint)) -> GeneratorState {
        let mut constraint = Constraint::new("Gas".into(), Category::Generator);
        f(&mut constraint);
        GeneratorState::new(&constraint, 1.0, 1)
    }

    fn outputs(state: &mut GeneratorState, loads: &[f64]) -> Vec<f64> {
        loads.iter().map(|load| state.step(*load).output).collect()
    }

    #[test]
    fn test_idle_without_demand() {
        let mut state = generator(|_| {});
        assert_eq!(state.step(0.0), GeneratorStep::default());
        assert_eq!(state.hours_on(), 0);
    }

    #[test]
    fn test_follows_load() {
        let mut state = generator(|_| {});
        assert_eq!(outputs(&mut state, &[0.5, 2.0, 0.25, 0.0]), [0.5, 1.0, 0.25, 0.0]);
        assert_eq!(state.hours_on(), 0);
    }

    #[test]
    fn test_warm_up() {
        let mut state = generator(|c| c.warm_time = 3);
        let out = outputs(&mut state, &[5.0; 5]);
        for (actual, expected) in out.iter().zip([0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0, 1.0]) {
            assert_approx_eq!(f64, *actual, expected);
        }
    }

    #[test]
    fn test_min_run_time() {
        let mut state = generator(|c| {
            c.min_run_time = 4;
            c.capacity_min = 0.3;
        });
        let steps: Vec<_> = [1.0, 0.0, 0.0, 0.0, 0.0]
            .iter()
            .map(|load| state.step(*load))
            .collect();
        assert_eq!(steps[0].to_load, 1.0);
        for step in &steps[1..4] {
            assert_eq!(step.output, 0.3);
            assert_eq!(step.excess, 0.3);
        }
        assert_eq!(steps[4].output, 0.0);
        assert_eq!(state.hours_on(), 0);
    }

    #[test]
    fn test_ramp_limits() {
        let mut state = generator(|c| {
            c.rampup_max = 0.25;
            c.rampdown_max = 0.5;
        });
        let out = outputs(&mut state, &[0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(out, [0.0, 0.25, 0.5, 0.75, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_half_hourly_scaling() {
        let mut constraint = Constraint::new("Gas".into(), Category::Generator);
        constraint.warm_time = 1;
        let mut state = GeneratorState::new(&constraint, 10.0, 2);
        let out = outputs(&mut state, &[100.0; 3]);
        assert_eq!(out, [0.0, 2.5, 5.0]);
    }
}
