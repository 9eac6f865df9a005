use crate::numeric::integrator::{
    evaluate, DifferentialEquation, IntegrationError, Integrator, StateVector, StepSize,
    DEFAULT_STEP_SIZE,
};
use log::trace;

#[derive(Clone, Debug)]
pub struct RK4Integrator {
    step_size: StepSize,
    last_step: f64,
}

impl RK4Integrator {
    pub fn new(step_size: f64) -> Self {
        RK4Integrator {
            step_size: StepSize::new(step_size),
            last_step: 0.0,
        }
    }
}

impl Default for RK4Integrator {
    fn default() -> Self {
        RK4Integrator::new(DEFAULT_STEP_SIZE)
    }
}

pub fn rk4(
    y: &StateVector,
    h: f64,
    f: &dyn DifferentialEquation,
) -> Result<StateVector, IntegrationError> {
    let k1 = evaluate(f, y)?;
    let k2 = evaluate(f, &(y + (h / 2.0) * &k1))?;
    let k3 = evaluate(f, &(y + (h / 2.0) * &k2))?;
    let k4 = evaluate(f, &(y + h * &k3))?;

    Ok(y + (h / 6.0) * (k1 + 2.0 * k2 + 2.0 * k3 + k4))
}

impl Integrator for RK4Integrator {
    fn next(
        &mut self,
        state: &StateVector,
        equation: &dyn DifferentialEquation,
        step: f64,
    ) -> Result<StateVector, IntegrationError> {
        let h = self.step_size.resolve(step);
        let next = rk4(state, h, equation)?;
        trace!("rk4 step h = {}: {:?} -> {:?}", h, state.as_slice(), next.as_slice());
        self.last_step = h;
        Ok(next)
    }

    fn step_size(&self) -> f64 {
        self.step_size.get()
    }

    fn set_step_size(&mut self, step_size: f64) {
        self.step_size.set(step_size);
    }

    fn reset_step_size(&mut self) {
        self.step_size.reset();
    }

    fn last_step(&self) -> f64 {
        self.last_step
    }
}
