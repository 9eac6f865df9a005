use crate::geometry::four_vector::FourVector;
use crate::geometry::geometry::{check_index, GeometryError, DIMENSION};
use crate::geometry::gram_schmidt::gram_schmidt;
use crate::geometry::manifold::Manifold;
use crate::geometry::point::{ChartId, Point};
use crate::geometry::tetrad::Tetrad;
use crate::numeric::integrator::{
    check_length, ContinuityToken, DifferentialEquation, IntegrationError, SharedIntegrator,
    StateVector,
};
use crate::simulation::particle::{integrate_step, Particle, SimulationError, Worldline};
use log::{debug, trace};

const STATE_LENGTH: usize = 5 * DIMENSION;

/// An oriented observer: a particle carrying an orthonormal tetrad of its 4-velocity and three
/// spatial directions, Fermi-Walker transported along its worldline.
///
/// Proper force and proper angular velocity, both in local tetrad components, accumulate until
/// the next step and are cleared afterwards.
pub struct Entity<'m> {
    particle: Particle<'m>,
    basis: [FourVector; 3],
    force: [f64; 3],
    angular_velocity: [f64; 3],
}

impl<'m> Entity<'m> {
    /// The tetrad is orthonormalized right away, keeping the direction of `velocity`.
    pub fn new(
        manifold: &'m Manifold,
        position: Point,
        velocity: FourVector,
        x: FourVector,
        y: FourVector,
        z: FourVector,
    ) -> Result<Self, GeometryError> {
        let mut entity = Entity {
            particle: Particle::new(manifold, position, velocity)?,
            basis: [x, y, z],
            force: [0.0; 3],
            angular_velocity: [0.0; 3],
        };
        entity.orthonormalize()?;
        Ok(entity)
    }

    pub fn manifold(&self) -> &'m Manifold {
        self.particle.manifold()
    }

    pub fn set_integrator(&mut self, integrator: SharedIntegrator) {
        self.particle.set_integrator(integrator);
    }

    pub fn x(&self) -> FourVector {
        self.basis[0]
    }

    pub fn y(&self) -> FourVector {
        self.basis[1]
    }

    pub fn z(&self) -> FourVector {
        self.basis[2]
    }

    /// Tetrad vector `i`, where 0 is the 4-velocity and 1 to 3 are the local x, y and z.
    pub fn tetrad_vector(&self, i: usize) -> Result<FourVector, GeometryError> {
        check_index(i, DIMENSION)?;
        Ok(match i {
            0 => self.particle.velocity(),
            _ => self.basis[i - 1],
        })
    }

    pub fn tetrad(&self) -> Tetrad {
        Tetrad::new(
            self.particle.position(),
            self.particle.velocity(),
            self.basis[0],
            self.basis[1],
            self.basis[2],
        )
    }

    pub fn set_position_velocity(
        &mut self,
        position: Point,
        velocity: FourVector,
    ) -> Result<(), GeometryError> {
        self.particle.set_position_velocity(position, velocity)?;
        self.orthonormalize()
    }

    pub fn set_velocity(&mut self, velocity: FourVector) -> Result<(), GeometryError> {
        self.particle.set_velocity(velocity);
        self.orthonormalize()
    }

    pub fn apply_force(&mut self, x: f64, y: f64, z: f64) {
        self.force[0] += x;
        self.force[1] += y;
        self.force[2] += z;
        self.particle.touch();
    }

    pub fn apply_angular_velocity(&mut self, x: f64, y: f64, z: f64) {
        self.angular_velocity[0] += x;
        self.angular_velocity[1] += y;
        self.angular_velocity[2] += z;
        self.particle.touch();
    }

    /// Rotates the spatial triad by yaw (around z), then pitch (around y) and finally roll (around
    /// the new x).
    pub fn rotate(&mut self, pitch: f64, yaw: f64, roll: f64) {
        let [b0, b1, b2] = self.basis;
        let (sin_pitch, cos_pitch) = pitch.sin_cos();
        let (sin_yaw, cos_yaw) = yaw.sin_cos();
        let (sin_roll, cos_roll) = roll.sin_cos();

        let yawed = cos_yaw * b0 - sin_yaw * b1;
        let new_x = cos_pitch * yawed + sin_pitch * b2;
        let new_y = cos_yaw * b1 + sin_yaw * b0;
        let new_z = cos_pitch * b2 - sin_pitch * yawed;

        self.basis = [
            new_x,
            cos_roll * new_y + sin_roll * new_z,
            cos_roll * new_z - sin_roll * new_y,
        ];
        self.particle.touch();
    }

    /// Re-derives an orthonormal tetrad from the current 4-velocity and triad, keeping the
    /// direction of the 4-velocity.
    pub fn orthonormalize(&mut self) -> Result<(), GeometryError> {
        let position = self.particle.position();
        let metric = self.particle.metric()?;
        let vectors = gram_schmidt(
            metric,
            &position,
            &[
                self.particle.velocity(),
                self.basis[0],
                self.basis[1],
                self.basis[2],
            ],
        )?;

        self.particle.set_velocity(vectors[0]);
        self.basis = [vectors[1], vectors[2], vectors[3]];
        Ok(())
    }

    pub fn set_chart(&mut self, chart: ChartId) -> Result<(), GeometryError> {
        let position = self.particle.position();
        if position.chart() == Some(chart) {
            return Ok(());
        }
        let manifold = self.particle.manifold();
        let mut basis = self.basis;
        for vector in basis.iter_mut() {
            *vector = manifold.convert_vector_to(vector, &position, chart)?;
        }
        self.particle.set_chart(chart)?;
        self.basis = basis;
        Ok(())
    }

    /// Blocked `[x(4), u(4), e_x(4), e_y(4), e_z(4)]`.
    pub fn state(&self) -> StateVector {
        let mut state = StateVector::zeros(STATE_LENGTH);
        let position = self.particle.position();
        let velocity = self.particle.velocity();
        for i in 0..DIMENSION {
            state[i] = position[i];
            state[DIMENSION + i] = velocity[i];
            for (b, vector) in self.basis.iter().enumerate() {
                state[(b + 2) * DIMENSION + i] = vector[i];
            }
        }
        state
    }

    fn vector_from_state(state: &StateVector, block: usize) -> FourVector {
        FourVector::from_slice(&state.as_slice()[block * DIMENSION..(block + 1) * DIMENSION])
    }

    /// Generator of the local Lorentz transformation: boosts in row and column 0, rotations in
    /// the antisymmetric spatial block.
    fn generator(&self) -> [[f64; 4]; 4] {
        let f = self.force;
        let w = self.angular_velocity;
        [
            [0.0, f[0], f[1], f[2]],
            [f[0], 0.0, -w[2], w[1]],
            [f[1], w[2], 0.0, -w[0]],
            [f[2], -w[1], w[0], 0.0],
        ]
    }
}

impl DifferentialEquation for Entity<'_> {
    fn dimension(&self) -> usize {
        STATE_LENGTH
    }

    /// `dV_c/dtau = sum_i G[i][c] V_i - Gamma(u, V_c)` for the tetrad `V = [u, e_x, e_y, e_z]`.
    fn derivative(&self, state: &StateVector) -> Result<StateVector, IntegrationError> {
        check_length(state, STATE_LENGTH)?;
        let position = self
            .particle
            .point_in_chart(&state.as_slice()[0..DIMENSION])?;
        let metric = self.particle.metric()?;

        let tetrad: [FourVector; 4] = [
            Self::vector_from_state(state, 1),
            Self::vector_from_state(state, 2),
            Self::vector_from_state(state, 3),
            Self::vector_from_state(state, 4),
        ];
        let velocity = tetrad[0];
        let generator = self.generator();

        let mut derivative = StateVector::zeros(STATE_LENGTH);
        for i in 0..DIMENSION {
            derivative[i] = velocity[i];
        }
        for (c, vector) in tetrad.iter().enumerate() {
            let mut transported = FourVector::zero();
            for (i, v) in tetrad.iter().enumerate() {
                transported += generator[i][c] * *v;
            }
            transported -= metric.contract_christoffel(&velocity, vector, &position)?;
            for i in 0..DIMENSION {
                derivative[(c + 1) * DIMENSION + i] = transported[i];
            }
        }
        trace!("Fermi-Walker derivative at {:?}: {:?}", position, derivative.as_slice());
        Ok(derivative)
    }

    fn continuity_token(&self) -> Option<ContinuityToken> {
        Some(self.particle.token())
    }
}

impl Worldline for Entity<'_> {
    fn position(&self) -> Point {
        self.particle.position()
    }

    fn velocity(&self) -> FourVector {
        self.particle.velocity()
    }

    fn proper_time(&self) -> f64 {
        self.particle.proper_time()
    }

    fn propagate(&mut self, dt: f64) -> Result<(), SimulationError> {
        let (next, taken) = integrate_step(self.particle.integrator(), &self.state(), &*self, dt)?;

        let position = self
            .particle
            .point_in_chart(&next.as_slice()[0..DIMENSION])?;
        let velocity = Self::vector_from_state(&next, 1);
        self.particle.advance(position, velocity, taken);
        for b in 0..3 {
            self.basis[b] = Self::vector_from_state(&next, b + 2);
        }

        let chart = self.particle.manifold().recommend_chart(&position)?;
        self.set_chart(chart)?;

        self.force = [0.0; 3];
        self.angular_velocity = [0.0; 3];
        self.orthonormalize()?;
        debug!(
            "entity at {:?} after step {}",
            self.particle.position(),
            taken
        );
        Ok(())
    }
}
