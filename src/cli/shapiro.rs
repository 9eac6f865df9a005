use crate::cli::cli::ShapiroOpts;
use crate::geometry::four_vector::FourVector;
use crate::geometry::point::Point;
use crate::geometry::schwarzschild::{schwarzschild_manifold, schwarzschild_time, EDDINGTON_FINKELSTEIN};
use crate::numeric::dormand_prince::{DPIntegrator, DEFAULT_MAX_STEP, DEFAULT_MIN_STEP};
use crate::numeric::integrator::{shared, SharedIntegrator, DEFAULT_STEP_SIZE};
use crate::simulation::particle::{Particle, SimulationError, Worldline};
use log::{debug, info};
use nalgebra::Vector4;
use std::f64::consts::FRAC_PI_2;
use std::io::Write;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapiroResult {
    /// Schwarzschild time at which the ray towards Earth reaches its radius.
    pub t_earth: f64,
    /// Schwarzschild time at which the ray traced back towards Venus reaches its radius.
    pub t_venus: f64,
    /// Round trip duration in the proper time of an observer on Earth.
    pub round_trip: f64,
    /// `round_trip` minus the flat-space round trip `2 (yE + yV)`.
    pub delay: f64,
}

/// Inverse of [`schwarzschild_time`] at `t = 0`.
fn eddington_finkelstein_u(r: f64, mass: f64) -> f64 {
    if mass == 0.0 {
        return r;
    }
    r + 2.0 * mass * (0.5 * (r - 2.0 * mass) / mass).ln()
}

/// Propagates `photon` outwards until it passes `radius` and interpolates the crossing linearly
/// between the last two steps.
fn crossing(
    photon: &mut Particle,
    radius: f64,
    max_steps: usize,
) -> Result<Point, SimulationError> {
    let mut last = photon.position();
    let mut steps = 0;
    while photon.position()[1] < radius {
        if steps == max_steps {
            return Err(SimulationError::RadiusNotReached { radius, steps });
        }
        last = photon.position();
        photon.propagate(0.0)?;
        steps += 1;
    }
    let position = photon.position();
    debug!("r = {} reached after {} steps", position[1], steps);
    if steps == 0 {
        return Ok(position);
    }

    let fraction = (radius - last[1]) / (position[1] - last[1]);
    let crossing: Vector4<f64> = last.vector + fraction * (position.vector - last.vector);
    Ok(Point::new_from_vector(EDDINGTON_FINKELSTEIN, crossing))
}

/// Two photons leave the perihelion of the ray in opposite directions, one forward in time to
/// Earth and one backward in time to Venus.
pub fn shapiro_delay(opts: &ShapiroOpts) -> Result<ShapiroResult, SimulationError> {
    let mass = opts.mass;
    let d = opts.perihelion;
    if !(d > 2.0 * mass) {
        return Err(SimulationError::Configuration(format!(
            "perihelion {} must lie outside the horizon of mass {}",
            d, mass
        )));
    }
    let r_earth = (d * d + opts.y_earth * opts.y_earth).sqrt();
    let r_venus = (d * d + opts.y_venus * opts.y_venus).sqrt();

    let manifold = schwarzschild_manifold(mass)?;
    let integrator: SharedIntegrator = shared(DPIntegrator::new(
        opts.max_error,
        DEFAULT_STEP_SIZE,
        DEFAULT_MIN_STEP,
        DEFAULT_MAX_STEP,
    ));

    // Null at the perihelion: (1 - 2M/d) u0^2 = d^2.
    let u0 = (d * d * d / (d - 2.0 * mass)).sqrt();
    let direction = FourVector::new(u0, 0.0, 0.0, 1.0);
    let start = Point::new(
        EDDINGTON_FINKELSTEIN,
        eddington_finkelstein_u(d, mass),
        d,
        FRAC_PI_2,
        0.0,
    );

    let mut to_earth = Particle::new(&manifold, start, direction)?;
    to_earth.set_integrator(integrator.clone());
    let mut to_venus = Particle::new(&manifold, start, -direction)?;
    to_venus.set_integrator(integrator.clone());

    info!("Propagating photon towards Earth, r = {}", r_earth);
    let earth = crossing(&mut to_earth, r_earth, opts.max_steps)?;
    let t_earth = schwarzschild_time(&earth, mass)?;

    integrator.borrow_mut().reset_step_size();

    info!("Propagating photon towards Venus, r = {}", r_venus);
    let venus = crossing(&mut to_venus, r_venus, opts.max_steps)?;
    let t_venus = schwarzschild_time(&venus, mass)?;

    let round_trip = 2.0 * (t_earth - t_venus) * (1.0 - 2.0 * mass / r_earth).sqrt();
    let delay = round_trip - 2.0 * (opts.y_earth + opts.y_venus);
    Ok(ShapiroResult {
        t_earth,
        t_venus,
        round_trip,
        delay,
    })
}

pub fn shapiro(opts: &ShapiroOpts, write: &mut dyn Write) -> Result<ShapiroResult, SimulationError> {
    write.write_all(
        format!(
            "d = {}\nyE = {}\nyV = {}\n",
            opts.perihelion, opts.y_earth, opts.y_venus
        )
        .as_bytes(),
    )?;
    let result = shapiro_delay(opts)?;
    write.write_all(
        format!(
            "t1 = {:.8}\nt2 = {:.8}\ndt = {:.8}\ndelay = {:.8e}\n",
            result.t_earth, result.t_venus, result.round_trip, result.delay
        )
        .as_bytes(),
    )?;
    write.flush()?;
    Ok(result)
}
