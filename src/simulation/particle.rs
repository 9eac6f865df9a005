use crate::geometry::four_vector::FourVector;
use crate::geometry::geometry::{GeometryError, DIMENSION};
use crate::geometry::manifold::Manifold;
use crate::geometry::metric::Metric;
use crate::geometry::point::{ChartId, Point};
use crate::numeric::integrator::{
    check_length, next_equation_id, ContinuityToken, DifferentialEquation, IntegrationError,
    SharedIntegrator, StateVector,
};
use log::{debug, trace};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("No integrator set")]
    NoIntegrator,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Radius {radius} not reached within {steps} steps")]
    RadiusNotReached { radius: f64, steps: usize },
}

/// Something that moves through a manifold one integrator step at a time.
pub trait Worldline {
    fn position(&self) -> Point;

    fn velocity(&self) -> FourVector;

    fn proper_time(&self) -> f64;

    /// Advances by `dt` of proper time (zero lets the integrator choose) and moves the state into
    /// the chart recommended at the new position.
    fn propagate(&mut self, dt: f64) -> Result<(), SimulationError>;

    fn chart(&self) -> Option<ChartId> {
        self.position().chart()
    }
}

pub(crate) fn integrate_step(
    integrator: Option<&SharedIntegrator>,
    state: &StateVector,
    equation: &dyn DifferentialEquation,
    dt: f64,
) -> Result<(StateVector, f64), SimulationError> {
    let integrator = integrator.ok_or(SimulationError::NoIntegrator)?;
    let mut integrator = integrator.borrow_mut();
    let next = integrator.next(state, equation, dt)?;
    Ok((next, integrator.last_step()))
}

/// A free-falling test particle: a position and a 4-velocity following the geodesic equation.
pub struct Particle<'m> {
    manifold: &'m Manifold,
    position: Point,
    velocity: FourVector,
    integrator: Option<SharedIntegrator>,
    proper_time: f64,
    id: u64,
    generation: u64,
}

impl<'m> Particle<'m> {
    pub fn new(
        manifold: &'m Manifold,
        position: Point,
        velocity: FourVector,
    ) -> Result<Self, GeometryError> {
        // Rejects points outside the manifold's charts. A particle keeps the chart it was given
        // until its first step.
        manifold.recommend_chart(&position)?;
        debug!("new particle at {:?}", position);
        Ok(Particle {
            manifold,
            position,
            velocity,
            integrator: None,
            proper_time: 0.0,
            id: next_equation_id(),
            generation: 0,
        })
    }

    pub fn manifold(&self) -> &'m Manifold {
        self.manifold
    }

    pub fn set_integrator(&mut self, integrator: SharedIntegrator) {
        self.integrator = Some(integrator);
        self.touch();
    }

    pub fn integrator(&self) -> Option<&SharedIntegrator> {
        self.integrator.as_ref()
    }

    pub fn set_position_velocity(
        &mut self,
        position: Point,
        velocity: FourVector,
    ) -> Result<(), GeometryError> {
        self.manifold.recommend_chart(&position)?;
        self.position = position;
        self.velocity = velocity;
        self.touch();
        Ok(())
    }

    pub fn set_velocity(&mut self, velocity: FourVector) {
        self.velocity = velocity;
        self.touch();
    }

    pub fn set_chart(&mut self, chart: ChartId) -> Result<(), GeometryError> {
        if self.position.chart() == Some(chart) {
            return Ok(());
        }
        let velocity = self
            .manifold
            .convert_vector_to(&self.velocity, &self.position, chart)?;
        let position = self.manifold.convert_point_to(&self.position, chart)?;
        debug!(
            "particle switches from chart {:?} to {} at {:?}",
            self.position.chart(),
            chart,
            position
        );
        self.velocity = velocity;
        self.position = position;
        self.touch();
        Ok(())
    }

    /// Interleaved `[x0, u0, x1, u1, x2, u2, x3, u3]`.
    pub fn state(&self) -> StateVector {
        let mut state = StateVector::zeros(2 * DIMENSION);
        for i in 0..DIMENSION {
            state[2 * i] = self.position[i];
            state[2 * i + 1] = self.velocity[i];
        }
        state
    }

    fn chart_id(&self) -> Result<ChartId, GeometryError> {
        self.position
            .chart()
            .ok_or_else(|| GeometryError::InvalidCoordinateSystem {
                expected: format!("0..{}", self.manifold.n_charts()),
                found: None,
            })
    }

    pub(crate) fn metric(&self) -> Result<&'m Metric, GeometryError> {
        self.manifold.metric(self.chart_id()?)
    }

    pub(crate) fn point_in_chart(&self, coordinates: &[f64]) -> Result<Point, GeometryError> {
        Ok(Point::from_slice(self.chart_id()?, coordinates))
    }

    /// Marks the state as changed outside of an integrator step.
    pub(crate) fn touch(&mut self) {
        self.generation += 1;
    }

    pub(crate) fn token(&self) -> ContinuityToken {
        ContinuityToken {
            equation: self.id,
            generation: self.generation,
        }
    }

    /// Takes over the integrator result without touching the continuity token.
    pub(crate) fn advance(&mut self, position: Point, velocity: FourVector, taken: f64) {
        self.position = position;
        self.velocity = velocity;
        self.proper_time += taken;
    }
}

impl DifferentialEquation for Particle<'_> {
    fn dimension(&self) -> usize {
        2 * DIMENSION
    }

    fn derivative(&self, state: &StateVector) -> Result<StateVector, IntegrationError> {
        check_length(state, self.dimension())?;
        let mut coordinates = [0.0; DIMENSION];
        let mut velocity = FourVector::zero();
        for i in 0..DIMENSION {
            coordinates[i] = state[2 * i];
            velocity[i] = state[2 * i + 1];
        }
        let position = self.point_in_chart(&coordinates)?;

        let metric = self.metric()?;
        let acceleration = -metric.contract_christoffel(&velocity, &velocity, &position)?;

        let mut derivative = StateVector::zeros(2 * DIMENSION);
        for i in 0..DIMENSION {
            derivative[2 * i] = velocity[i];
            derivative[2 * i + 1] = acceleration[i];
        }
        trace!("geodesic derivative at {:?}: {:?}", position, derivative.as_slice());
        Ok(derivative)
    }

    fn continuity_token(&self) -> Option<ContinuityToken> {
        Some(self.token())
    }
}

impl Worldline for Particle<'_> {
    fn position(&self) -> Point {
        self.position
    }

    fn velocity(&self) -> FourVector {
        self.velocity
    }

    fn proper_time(&self) -> f64 {
        self.proper_time
    }

    fn propagate(&mut self, dt: f64) -> Result<(), SimulationError> {
        let (next, taken) = integrate_step(self.integrator.as_ref(), &self.state(), &*self, dt)?;

        let mut position = self.position;
        let mut velocity = self.velocity;
        for i in 0..DIMENSION {
            position[i] = next[2 * i];
            velocity[i] = next[2 * i + 1];
        }
        self.advance(position, velocity, taken);

        let chart = self.manifold.recommend_chart(&self.position)?;
        self.set_chart(chart)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::four_vector::FourVector;
    use crate::geometry::point::Point;
    use crate::geometry::schwarzschild::{
        schwarzschild_manifold, EDDINGTON_FINKELSTEIN, NORTH_POLE,
    };
    use crate::numeric::dormand_prince::DPIntegrator;
    use crate::numeric::integrator::{
        shared, DifferentialEquation, IntegrationError, StateVector,
    };
    use crate::numeric::runge_kutta::RK4Integrator;
    use crate::simulation::particle::{Particle, SimulationError, Worldline};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_flat_space_straight_line() {
        let manifold = schwarzschild_manifold(0.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 0.0, 10.0, FRAC_PI_2, 0.0);
        let mut particle =
            Particle::new(&manifold, position, FourVector::new(1.0, 0.0, 0.0, 0.0)).unwrap();
        particle.set_integrator(shared(RK4Integrator::new(0.01)));

        particle.propagate(1.0).unwrap();

        assert_abs_diff_eq!(
            particle.position().vector,
            position.vector + nalgebra::Vector4::new(1.0, 0.0, 0.0, 0.0),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            particle.velocity().vector,
            FourVector::new(1.0, 0.0, 0.0, 0.0).vector,
            epsilon = 1e-12
        );
        assert_eq!(particle.proper_time(), 1.0);
    }

    #[test]
    fn test_state_layout_round_trip() {
        let manifold = schwarzschild_manifold(1.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 1.0, 2.0, 3.0, 4.0);
        let particle =
            Particle::new(&manifold, position, FourVector::new(5.0, 6.0, 7.0, 8.0)).unwrap();

        assert_eq!(
            particle.state(),
            StateVector::from_column_slice(&[1.0, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0])
        );
    }

    #[test]
    fn test_geodesic_derivative() {
        let manifold = schwarzschild_manifold(1.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 0.0, 4.0, FRAC_PI_2, 0.0);
        let particle =
            Particle::new(&manifold, position, FourVector::new(1.0, 0.0, 0.0, 0.0)).unwrap();

        let derivative = particle.derivative(&particle.state()).unwrap();

        // Gamma^u_uu = M/r^2, Gamma^r_uu = M (1 - 2M/r) / r^2
        assert_abs_diff_eq!(derivative[0], 1.0);
        assert_abs_diff_eq!(derivative[1], -1.0 / 16.0);
        assert_abs_diff_eq!(derivative[3], -0.5 / 16.0);
        assert_abs_diff_eq!(derivative[5], 0.0);
    }

    #[test]
    fn test_radial_infall_accelerates_inwards() {
        let manifold = schwarzschild_manifold(1.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 0.0, 10.0, FRAC_PI_2, 0.0);
        // Static observer: u^u = 1/sqrt(1 - 2M/r).
        let u0 = 1.0 / (0.8f64).sqrt();
        let mut particle =
            Particle::new(&manifold, position, FourVector::new(u0, 0.0, 0.0, 0.0)).unwrap();
        particle.set_integrator(shared(DPIntegrator::default()));

        let norm_before = manifold
            .inner_product(&particle.velocity(), &particle.velocity(), &particle.position())
            .unwrap();
        for _ in 0..50 {
            particle.propagate(0.0).unwrap();
        }
        let norm_after = manifold
            .inner_product(&particle.velocity(), &particle.velocity(), &particle.position())
            .unwrap();

        assert!(particle.position()[1] < 10.0);
        assert!(particle.velocity()[1] < 0.0);
        assert_abs_diff_eq!(norm_before, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_after, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_chart_switch_near_pole() {
        let manifold = schwarzschild_manifold(1.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 0.0, 10.0, 0.52, 0.3);
        let velocity = FourVector::new(1.2, 0.0, -0.05, 0.0);
        let mut particle = Particle::new(&manifold, position, velocity).unwrap();
        particle.set_integrator(shared(RK4Integrator::new(0.1)));

        let mut switched = false;
        for _ in 0..20 {
            let before_position = particle.position();
            let before_velocity = particle.velocity();
            particle.propagate(0.0).unwrap();
            if particle.chart() == Some(NORTH_POLE) {
                // Both the position and the velocity are in the new chart.
                assert_eq!(particle.position().chart(), Some(NORTH_POLE));
                let invariant = manifold
                    .inner_product(&particle.velocity(), &particle.velocity(), &particle.position())
                    .unwrap();
                let expected = manifold
                    .inner_product(&before_velocity, &before_velocity, &before_position)
                    .unwrap();
                assert_abs_diff_eq!(invariant, expected, epsilon = 1e-6);
                switched = true;
                break;
            }
        }
        assert!(switched);
    }

    #[test]
    fn test_set_chart_is_reversible() {
        let manifold = schwarzschild_manifold(1.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 0.0, 10.0, 0.3, 0.3);
        let velocity = FourVector::new(1.2, 0.1, -0.05, 0.02);
        let mut particle = Particle::new(&manifold, position, velocity).unwrap();

        particle.set_chart(NORTH_POLE).unwrap();
        assert_eq!(particle.chart(), Some(NORTH_POLE));
        particle.set_chart(EDDINGTON_FINKELSTEIN).unwrap();

        assert_abs_diff_eq!(particle.position().vector, position.vector, epsilon = 1e-12);
        assert_abs_diff_eq!(particle.velocity().vector, velocity.vector, epsilon = 1e-12);
    }

    #[test]
    fn test_propagate_without_integrator() {
        let manifold = schwarzschild_manifold(1.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 0.0, 10.0, FRAC_PI_2, 0.0);
        let mut particle =
            Particle::new(&manifold, position, FourVector::new(1.0, 0.0, 0.0, 0.0)).unwrap();

        assert!(matches!(
            particle.propagate(0.1),
            Err(SimulationError::NoIntegrator)
        ));
        assert_eq!(particle.position(), position);
    }

    #[test]
    fn test_derivative_length_mismatch() {
        let manifold = schwarzschild_manifold(1.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 0.0, 10.0, FRAC_PI_2, 0.0);
        let particle =
            Particle::new(&manifold, position, FourVector::new(1.0, 0.0, 0.0, 0.0)).unwrap();

        assert_eq!(
            particle.derivative(&StateVector::zeros(20)),
            Err(IntegrationError::LengthMismatch {
                expected: 8,
                found: 20
            })
        );
    }

    #[test]
    fn test_out_of_band_mutation_changes_token() {
        let manifold = schwarzschild_manifold(1.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 0.0, 10.0, FRAC_PI_2, 0.0);
        let mut particle =
            Particle::new(&manifold, position, FourVector::new(1.0, 0.0, 0.0, 0.0)).unwrap();
        particle.set_integrator(shared(RK4Integrator::new(0.1)));

        let initial = particle.continuity_token();
        particle.propagate(0.0).unwrap();
        assert_eq!(particle.continuity_token(), initial);

        particle.set_velocity(FourVector::new(1.1, 0.0, 0.0, 0.0));
        assert_ne!(particle.continuity_token(), initial);
    }

    #[test]
    fn test_new_keeps_given_chart() {
        let manifold = schwarzschild_manifold(1.0).unwrap();
        let position = Point::new(EDDINGTON_FINKELSTEIN, 0.0, 10.0, 0.3, 0.3);
        assert_eq!(manifold.recommend_chart(&position).unwrap(), NORTH_POLE);

        let particle =
            Particle::new(&manifold, position, FourVector::new(1.0, 0.0, 0.0, 0.0)).unwrap();

        assert_eq!(particle.chart(), Some(EDDINGTON_FINKELSTEIN));
        assert_eq!(particle.position(), position);
    }

    #[test]
    fn test_invalid_position_is_rejected() {
        let manifold = schwarzschild_manifold(1.0).unwrap();

        assert!(Particle::new(&manifold, Point::invalid(), FourVector::zero()).is_err());
        assert!(Particle::new(
            &manifold,
            Point::new(7, 0.0, 10.0, 1.0, 0.0),
            FourVector::zero()
        )
        .is_err());
    }
}
