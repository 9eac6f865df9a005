use crate::numeric::integrator::{
    evaluate, ContinuityToken, DifferentialEquation, IntegrationError, Integrator, StateVector,
    StepSize, DEFAULT_STEP_SIZE,
};
use log::{debug, trace, warn};

// See https://en.wikipedia.org/wiki/Dormand%E2%80%93Prince_method

const B_2_1: f64 = 1.0 / 5.0;

const B_3_1: f64 = 3.0 / 40.0;
const B_3_2: f64 = 9.0 / 40.0;

const B_4_1: f64 = 44.0 / 45.0;
const B_4_2: f64 = -56.0 / 15.0;
const B_4_3: f64 = 32.0 / 9.0;

const B_5_1: f64 = 19372.0 / 6561.0;
const B_5_2: f64 = -25360.0 / 2187.0;
const B_5_3: f64 = 64448.0 / 6561.0;
const B_5_4: f64 = -212.0 / 729.0;

const B_6_1: f64 = 9017.0 / 3168.0;
const B_6_2: f64 = -355.0 / 33.0;
const B_6_3: f64 = 46732.0 / 5247.0;
const B_6_4: f64 = 49.0 / 176.0;
const B_6_5: f64 = -5103.0 / 18656.0;

const C_1: f64 = 35.0 / 384.0;
const C_3: f64 = 500.0 / 1113.0;
const C_4: f64 = 125.0 / 192.0;
const C_5: f64 = -2187.0 / 6784.0;
const C_6: f64 = 11.0 / 84.0;

// Difference between the fifth and the embedded fourth order solution.
const E_1: f64 = 71.0 / 57600.0;
const E_3: f64 = -71.0 / 16695.0;
const E_4: f64 = 71.0 / 1920.0;
const E_5: f64 = -17253.0 / 339200.0;
const E_6: f64 = 22.0 / 525.0;
const E_7: f64 = -1.0 / 40.0;

const ERROR_EXPONENT: f64 = 0.25;
/// A proposed step below this fraction of the attempted one rejects the attempt.
const REJECTION_FACTOR: f64 = 0.8;

pub const DEFAULT_MAX_ERROR: f64 = 1e-6;
pub const DEFAULT_MIN_STEP: f64 = 1e-4;
pub const DEFAULT_MAX_STEP: f64 = 0.1;

struct LastDerivative {
    token: ContinuityToken,
    derivative: StateVector,
}

/// Adaptive embedded Dormand-Prince 5(4) integrator.
///
/// After every step the default step size is set to the size that would just meet `max_error`,
/// clamped to `[min_step, max_step]`. When the caller leaves the step to the integrator and that
/// proposal is well below the attempted step, the attempt is discarded and repeated with the
/// smaller step.
pub struct DPIntegrator {
    max_error: f64,
    min_step: f64,
    max_step: f64,
    step_size: StepSize,
    last_step: f64,
    last_error: f64,
    last_derivative: Option<LastDerivative>,
}

impl DPIntegrator {
    pub fn new(max_error: f64, step_size: f64, min_step: f64, max_step: f64) -> Self {
        DPIntegrator {
            max_error,
            min_step,
            max_step,
            step_size: StepSize::new(step_size),
            last_step: 0.0,
            last_error: 0.0,
            last_derivative: None,
        }
    }

    pub fn max_error(&self) -> f64 {
        self.max_error
    }

    pub fn min_step(&self) -> f64 {
        self.min_step
    }

    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    pub fn set_max_error(&mut self, max_error: f64) {
        self.max_error = max_error;
    }

    pub fn set_min_step(&mut self, min_step: f64) {
        self.min_step = min_step;
    }

    pub fn set_max_step(&mut self, max_step: f64) {
        self.max_step = max_step;
    }

    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    fn proposed_step(&self, h: f64, error: f64) -> f64 {
        let proposal = if error != 0.0 {
            h * (self.max_error / error).powf(ERROR_EXPONENT)
        } else {
            self.max_step
        };
        proposal.max(self.min_step).min(self.max_step)
    }

    fn first_derivative(
        &self,
        state: &StateVector,
        equation: &dyn DifferentialEquation,
    ) -> Result<StateVector, IntegrationError> {
        if let (Some(last), Some(token)) = (&self.last_derivative, equation.continuity_token()) {
            if last.token == token && last.derivative.len() == state.len() {
                trace!("reusing last derivative for {:?}", token);
                return Ok(last.derivative.clone());
            }
        }
        evaluate(equation, state)
    }
}

impl Default for DPIntegrator {
    fn default() -> Self {
        DPIntegrator::new(
            DEFAULT_MAX_ERROR,
            DEFAULT_STEP_SIZE,
            DEFAULT_MIN_STEP,
            DEFAULT_MAX_STEP,
        )
    }
}

/// One attempt with step `h`, returning the fifth order state, the derivative there and the
/// error estimate.
fn dormand_prince_step(
    y: &StateVector,
    h: f64,
    derivative: &StateVector,
    f: &dyn DifferentialEquation,
) -> Result<(StateVector, StateVector, f64), IntegrationError> {
    let k1 = h * derivative;
    let k2 = h * evaluate(f, &(y + B_2_1 * &k1))?;
    let k3 = h * evaluate(f, &(y + B_3_1 * &k1 + B_3_2 * &k2))?;
    let k4 = h * evaluate(f, &(y + B_4_1 * &k1 + B_4_2 * &k2 + B_4_3 * &k3))?;
    let k5 = h * evaluate(
        f,
        &(y + B_5_1 * &k1 + B_5_2 * &k2 + B_5_3 * &k3 + B_5_4 * &k4),
    )?;
    let k6 = h * evaluate(
        f,
        &(y + B_6_1 * &k1 + B_6_2 * &k2 + B_6_3 * &k3 + B_6_4 * &k4 + B_6_5 * &k5),
    )?;

    let y_new = y + C_1 * &k1 + C_3 * &k3 + C_4 * &k4 + C_5 * &k5 + C_6 * &k6;
    let k7 = evaluate(f, &y_new)?;

    let error =
        (E_1 * k1 + E_3 * k3 + E_4 * k4 + E_5 * k5 + E_6 * k6 + (E_7 * h) * &k7).norm();
    Ok((y_new, k7, error))
}

impl Integrator for DPIntegrator {
    fn next(
        &mut self,
        state: &StateVector,
        equation: &dyn DifferentialEquation,
        step: f64,
    ) -> Result<StateVector, IntegrationError> {
        let explicit_step = step != 0.0;
        let mut h = self.step_size.resolve(step);
        let derivative = self.first_derivative(state, equation)?;

        loop {
            let (y_new, k7, error) = dormand_prince_step(state, h, &derivative, equation)?;
            let proposal = self.proposed_step(h, error);
            self.step_size.set(proposal);

            if !explicit_step && proposal < REJECTION_FACTOR * h {
                debug!(
                    "rejecting step h = {} with error {:e}, retrying with h = {}",
                    h, error, proposal
                );
                h = proposal;
                continue;
            }

            if error > self.max_error && h <= self.min_step {
                warn!(
                    "error {:e} exceeds {:e} at minimal step size {}",
                    error, self.max_error, h
                );
            }
            trace!("accepted step h = {} with error {:e}, next h = {}", h, error, proposal);

            self.last_step = h;
            self.last_error = error;
            self.last_derivative = equation
                .continuity_token()
                .map(|token| LastDerivative {
                    token,
                    derivative: k7,
                });
            return Ok(y_new);
        }
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
