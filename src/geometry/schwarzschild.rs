use crate::geometry::conversion::{angular_block, IdentityConversion};
use crate::geometry::geometry::{require_chart, CoordinateConversion, GeometryError, MetricFormula};
use crate::geometry::manifold::{ChartPolicy, Manifold};
use crate::geometry::metric::Metric;
use crate::geometry::point::{ChartId, Point};
use crate::geometry::stereographic_coordinates_helper::{
    angles_to_stereographic, angles_to_stereographic_jacobian, conformal_factor, invert,
    inversion_jacobian, stereographic_to_angles, stereographic_to_angles_jacobian, Pole,
};
use log::debug;
use nalgebra::Matrix4;

/// Ingoing Eddington-Finkelstein coordinates `(u, r, theta, phi)`.
pub const EDDINGTON_FINKELSTEIN: ChartId = 0;
/// `(u, r, x, y)` with `(x, y)` the stereographic projection around `theta = 0`.
pub const NORTH_POLE: ChartId = 1;
/// `(u, r, x, y)` with `(x, y)` the stereographic projection around `theta = pi`.
pub const SOUTH_POLE: ChartId = 2;

pub const DEFAULT_POLE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_POLE_RADIUS_SQ: f64 = 0.07;

fn pole_chart(pole: Pole) -> ChartId {
    match pole {
        Pole::North => NORTH_POLE,
        Pole::South => SOUTH_POLE,
    }
}

fn chart_name(chart: ChartId) -> &'static str {
    match chart {
        EDDINGTON_FINKELSTEIN => "Eddington-Finkelstein",
        NORTH_POLE => "north pole",
        SOUTH_POLE => "south pole",
        _ => "unknown",
    }
}

/// Metric in ingoing Eddington-Finkelstein coordinates, signature (+,-,-,-):
/// `ds^2 = (1 - 2M/r) du^2 - 2 du dr - r^2 (d theta^2 + sin^2 theta d phi^2)`.
pub struct EddingtonFinkelsteinMetric {
    mass: f64,
}

impl EddingtonFinkelsteinMetric {
    pub fn new(mass: f64) -> Self {
        EddingtonFinkelsteinMetric { mass }
    }
}

impl MetricFormula for EddingtonFinkelsteinMetric {
    fn component(&self, i: usize, j: usize, point: &Point) -> f64 {
        let r = point[1];
        let sin_theta = point[2].sin();
        match (i, j) {
            (0, 0) => 1.0 - 2.0 * self.mass / r,
            (0, 1) => -1.0,
            (2, 2) => -r * r,
            (3, 3) => -r * r * sin_theta * sin_theta,
            _ => 0.0,
        }
    }

    fn inverse_component(&self, i: usize, j: usize, point: &Point) -> f64 {
        let r = point[1];
        let sin_theta = point[2].sin();
        match (i, j) {
            (0, 1) => -1.0,
            (1, 1) => -(1.0 - 2.0 * self.mass / r),
            (2, 2) => -1.0 / (r * r),
            (3, 3) => -1.0 / (r * r * sin_theta * sin_theta),
            _ => 0.0,
        }
    }

    fn christoffel_component(&self, i: usize, j: usize, k: usize, point: &Point) -> Option<f64> {
        let m = self.mass;
        let r = point[1];
        let (sin_theta, cos_theta) = point[2].sin_cos();
        let a = 1.0 - 2.0 * m / r;

        let value = match (i, j, k) {
            (0, 0, 0) => m / (r * r),
            (0, 2, 2) => -r,
            (0, 3, 3) => -r * sin_theta * sin_theta,

            (1, 0, 0) => m * a / (r * r),
            (1, 0, 1) => -m / (r * r),
            (1, 2, 2) => -r * a,
            (1, 3, 3) => -r * a * sin_theta * sin_theta,

            (2, 1, 2) => 1.0 / r,
            (2, 3, 3) => -sin_theta * cos_theta,

            (3, 1, 3) => 1.0 / r,
            (3, 2, 3) => cos_theta / sin_theta,

            _ => 0.0,
        };
        Some(value)
    }
}

/// Metric in a near-pole chart `(u, r, x, y)`, the same for both poles. Christoffel symbols come
/// from finite differences.
pub struct NearPoleMetric {
    mass: f64,
}

impl NearPoleMetric {
    pub fn new(mass: f64) -> Self {
        NearPoleMetric { mass }
    }
}

impl MetricFormula for NearPoleMetric {
    fn component(&self, i: usize, j: usize, point: &Point) -> f64 {
        let r = point[1];
        match (i, j) {
            (0, 0) => 1.0 - 2.0 * self.mass / r,
            (0, 1) => -1.0,
            (2, 2) | (3, 3) => -conformal_factor(point[2], point[3]) * r * r,
            _ => 0.0,
        }
    }

    fn inverse_component(&self, i: usize, j: usize, point: &Point) -> f64 {
        let r = point[1];
        match (i, j) {
            (0, 1) => -1.0,
            (1, 1) => -(1.0 - 2.0 * self.mass / r),
            (2, 2) | (3, 3) => -1.0 / (conformal_factor(point[2], point[3]) * r * r),
            _ => 0.0,
        }
    }
}

/// The non-trivial chart transitions of the Schwarzschild manifold. `u` and `r` are shared by all
/// charts, only the angular coordinates change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchwarzschildConversion {
    ToPole(Pole),
    FromPole(Pole),
    /// From the chart of the given pole into the chart of the opposite pole.
    PoleToPole(Pole),
}

impl SchwarzschildConversion {
    fn source(&self) -> ChartId {
        match self {
            SchwarzschildConversion::ToPole(_) => EDDINGTON_FINKELSTEIN,
            SchwarzschildConversion::FromPole(pole) | SchwarzschildConversion::PoleToPole(pole) => {
                pole_chart(*pole)
            }
        }
    }

    fn target(&self) -> ChartId {
        match self {
            SchwarzschildConversion::ToPole(pole) => pole_chart(*pole),
            SchwarzschildConversion::FromPole(_) => EDDINGTON_FINKELSTEIN,
            SchwarzschildConversion::PoleToPole(pole) => pole_chart(pole.opposite()),
        }
    }

    fn map_angles(&self, a: f64, b: f64) -> (f64, f64) {
        match self {
            SchwarzschildConversion::ToPole(pole) => angles_to_stereographic(*pole, a, b),
            SchwarzschildConversion::FromPole(pole) => stereographic_to_angles(*pole, a, b),
            SchwarzschildConversion::PoleToPole(_) => invert(a, b),
        }
    }

    /// `d(new)/d(old)` of the angular map at old coordinates `(a, b)`.
    fn forward_block(&self, a: f64, b: f64) -> [f64; 4] {
        match self {
            SchwarzschildConversion::ToPole(pole) => angles_to_stereographic_jacobian(*pole, a, b),
            SchwarzschildConversion::FromPole(pole) => {
                stereographic_to_angles_jacobian(*pole, a, b)
            }
            SchwarzschildConversion::PoleToPole(_) => inversion_jacobian(a, b),
        }
    }

    /// `d(old)/d(new)` of the angular map, evaluated at the image of `(a, b)`.
    fn backward_block(&self, a: f64, b: f64) -> [f64; 4] {
        let (c, d) = self.map_angles(a, b);
        match self {
            SchwarzschildConversion::ToPole(pole) => stereographic_to_angles_jacobian(*pole, c, d),
            SchwarzschildConversion::FromPole(pole) => {
                angles_to_stereographic_jacobian(*pole, c, d)
            }
            SchwarzschildConversion::PoleToPole(_) => inversion_jacobian(c, d),
        }
    }
}

impl CoordinateConversion for SchwarzschildConversion {
    fn convert_point(&self, point: &Point) -> Result<Point, GeometryError> {
        require_chart(point, self.source())?;
        let (c, d) = self.map_angles(point[2], point[3]);
        Ok(Point::new(self.target(), point[0], point[1], c, d))
    }

    fn jacobian_matrix(&self, point: &Point) -> Result<Matrix4<f64>, GeometryError> {
        require_chart(point, self.source())?;
        Ok(angular_block(self.backward_block(point[2], point[3])))
    }

    fn inv_jacobian_matrix(&self, point: &Point) -> Result<Matrix4<f64>, GeometryError> {
        require_chart(point, self.source())?;
        Ok(angular_block(self.forward_block(point[2], point[3])))
    }
}

/// Moves points off the polar axis of the Eddington-Finkelstein chart.
///
/// A point enters a pole chart once its polar angle is within `threshold` of a pole and returns
/// to Eddington-Finkelstein coordinates once `x^2 + y^2` exceeds `radius_sq`.
pub struct PolarCapPolicy {
    threshold: f64,
    radius_sq: f64,
}

impl PolarCapPolicy {
    pub fn new(threshold: f64, radius_sq: f64) -> Result<Self, GeometryError> {
        let entry_radius = (0.5 * threshold).tan();
        if !(threshold > 0.0 && threshold < std::f64::consts::FRAC_PI_2) {
            return Err(GeometryError::InvalidManifold(format!(
                "pole threshold {} must lie in (0, pi/2)",
                threshold
            )));
        }
        if radius_sq <= entry_radius * entry_radius || radius_sq >= 1.0 {
            return Err(GeometryError::InvalidManifold(format!(
                "pole radius {} must lie in ({}, 1)",
                radius_sq,
                entry_radius * entry_radius
            )));
        }
        Ok(PolarCapPolicy {
            threshold,
            radius_sq,
        })
    }
}

impl ChartPolicy for PolarCapPolicy {
    fn recommend_chart(&self, point: &Point) -> Result<ChartId, GeometryError> {
        let recommended = match point.chart() {
            Some(EDDINGTON_FINKELSTEIN) => {
                let theta = point[2];
                if theta < self.threshold {
                    NORTH_POLE
                } else if theta > std::f64::consts::PI - self.threshold {
                    SOUTH_POLE
                } else {
                    EDDINGTON_FINKELSTEIN
                }
            }
            Some(chart @ (NORTH_POLE | SOUTH_POLE)) => {
                if point[2] * point[2] + point[3] * point[3] > self.radius_sq {
                    EDDINGTON_FINKELSTEIN
                } else {
                    chart
                }
            }
            found => {
                return Err(GeometryError::InvalidCoordinateSystem {
                    expected: "0, 1 or 2".to_string(),
                    found,
                })
            }
        };
        if Some(recommended) != point.chart() {
            debug!(
                "recommending {} chart at {:?}",
                chart_name(recommended),
                point.vector
            );
        }
        Ok(recommended)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Schwarzschild {
    mass: f64,
    pole_threshold: f64,
    pole_radius_sq: f64,
    cached: bool,
}

impl Schwarzschild {
    pub fn new(mass: f64) -> Self {
        Schwarzschild {
            mass,
            pole_threshold: DEFAULT_POLE_THRESHOLD,
            pole_radius_sq: DEFAULT_POLE_RADIUS_SQ,
            cached: true,
        }
    }

    pub fn with_pole_thresholds(mut self, threshold: f64, radius_sq: f64) -> Self {
        self.pole_threshold = threshold;
        self.pole_radius_sq = radius_sq;
        self
    }

    pub fn with_cache(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn build(&self) -> Result<Manifold, GeometryError> {
        if !(self.mass >= 0.0) {
            return Err(GeometryError::InvalidManifold(format!(
                "mass must be non-negative, got {}",
                self.mass
            )));
        }
        let metric = |chart: ChartId, formula: Box<dyn MetricFormula>| {
            if self.cached {
                Metric::new(chart, formula)
            } else {
                Metric::uncached(chart, formula)
            }
        };
        let metrics = vec![
            metric(
                EDDINGTON_FINKELSTEIN,
                Box::new(EddingtonFinkelsteinMetric::new(self.mass)),
            ),
            metric(NORTH_POLE, Box::new(NearPoleMetric::new(self.mass))),
            metric(SOUTH_POLE, Box::new(NearPoleMetric::new(self.mass))),
        ];

        let conversions: Vec<Vec<Box<dyn CoordinateConversion>>> = vec![
            vec![
                Box::new(IdentityConversion::new(EDDINGTON_FINKELSTEIN)),
                Box::new(SchwarzschildConversion::ToPole(Pole::North)),
                Box::new(SchwarzschildConversion::ToPole(Pole::South)),
            ],
            vec![
                Box::new(SchwarzschildConversion::FromPole(Pole::North)),
                Box::new(IdentityConversion::new(NORTH_POLE)),
                Box::new(SchwarzschildConversion::PoleToPole(Pole::North)),
            ],
            vec![
                Box::new(SchwarzschildConversion::FromPole(Pole::South)),
                Box::new(SchwarzschildConversion::PoleToPole(Pole::South)),
                Box::new(IdentityConversion::new(SOUTH_POLE)),
            ],
        ];

        let policy = PolarCapPolicy::new(self.pole_threshold, self.pole_radius_sq)?;
        debug!(
            "building Schwarzschild manifold: mass = {}, pole threshold = {}, pole radius^2 = {}, cached = {}",
            self.mass, self.pole_threshold, self.pole_radius_sq, self.cached
        );
        Manifold::new(metrics, conversions, Box::new(policy))
    }
}

pub fn schwarzschild_manifold(mass: f64) -> Result<Manifold, GeometryError> {
    Schwarzschild::new(mass).build()
}

/// Schwarzschild time `t = u - r - 2M ln(r/2M - 1)` of a point outside the horizon given in
/// ingoing Eddington-Finkelstein coordinates.
pub fn schwarzschild_time(point: &Point, mass: f64) -> Result<f64, GeometryError> {
    require_chart(point, EDDINGTON_FINKELSTEIN)?;
    let u = point[0];
    let r = point[1];
    if mass == 0.0 {
        return Ok(u - r);
    }
    Ok(u - r - 2.0 * mass * (0.5 * (r - 2.0 * mass) / mass).ln())
}
