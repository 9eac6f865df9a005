use crate::geometry::geometry::GeometryError;
use nalgebra::DVector;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type StateVector = DVector<f64>;

pub const DEFAULT_STEP_SIZE: f64 = 0.01;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum IntegrationError {
    #[error("State vector length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

pub fn check_length(state: &StateVector, expected: usize) -> Result<(), IntegrationError> {
    if state.len() != expected {
        return Err(IntegrationError::LengthMismatch {
            expected,
            found: state.len(),
        });
    }
    Ok(())
}

/// Identifies an equation together with the version of its out-of-band state.
///
/// An integrator may reuse the last derivative of its previous step only while the token of the
/// equation it is called with is unchanged. Equations bump the generation whenever the state they
/// will be integrated from no longer follows from the last accepted step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContinuityToken {
    pub equation: u64,
    pub generation: u64,
}

static NEXT_EQUATION_ID: AtomicU64 = AtomicU64::new(0);

pub fn next_equation_id() -> u64 {
    NEXT_EQUATION_ID.fetch_add(1, Ordering::Relaxed)
}

/// `dy/dtau = f(y)` on states of a fixed length.
pub trait DifferentialEquation {
    fn dimension(&self) -> usize;

    fn derivative(&self, state: &StateVector) -> Result<StateVector, IntegrationError>;

    /// `None` disables first-same-as-last reuse for this equation.
    fn continuity_token(&self) -> Option<ContinuityToken> {
        None
    }
}

/// Evaluates `equation` at `state`, checking the length of its input and of its output.
pub fn evaluate(
    equation: &dyn DifferentialEquation,
    state: &StateVector,
) -> Result<StateVector, IntegrationError> {
    check_length(state, equation.dimension())?;
    let derivative = equation.derivative(state)?;
    check_length(&derivative, state.len())?;
    Ok(derivative)
}

pub trait Integrator {
    /// Advances `state` by one step of `equation`. A `step` of zero uses the integrator's current
    /// default step size.
    fn next(
        &mut self,
        state: &StateVector,
        equation: &dyn DifferentialEquation,
        step: f64,
    ) -> Result<StateVector, IntegrationError>;

    fn step_size(&self) -> f64;

    fn set_step_size(&mut self, step_size: f64);

    fn reset_step_size(&mut self);

    /// Step actually taken by the most recent successful `next` call, zero before the first one.
    fn last_step(&self) -> f64;
}

/// An integrator handle shared by several worldlines. The worldlines do not own it exclusively.
pub type SharedIntegrator = Rc<RefCell<dyn Integrator>>;

pub fn shared<I: Integrator + 'static>(integrator: I) -> SharedIntegrator {
    Rc::new(RefCell::new(integrator))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepSize {
    initial: f64,
    current: f64,
}

impl StepSize {
    pub fn new(initial: f64) -> Self {
        StepSize {
            initial,
            current: initial,
        }
    }

    pub fn get(&self) -> f64 {
        self.current
    }

    pub fn set(&mut self, step_size: f64) {
        self.current = step_size;
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn resolve(&self, step: f64) -> f64 {
        if step == 0.0 {
            self.current
        } else {
            step
        }
    }
}
