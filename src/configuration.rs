use crate::geometry::four_vector::FourVector;
use crate::geometry::geometry::GeometryError;
use crate::geometry::manifold::Manifold;
use crate::geometry::point::{ChartId, Point};
use crate::geometry::schwarzschild::{Schwarzschild, DEFAULT_POLE_RADIUS_SQ, DEFAULT_POLE_THRESHOLD};
use crate::numeric::dormand_prince::{
    DPIntegrator, DEFAULT_MAX_ERROR, DEFAULT_MAX_STEP, DEFAULT_MIN_STEP,
};
use crate::numeric::integrator::{shared, SharedIntegrator, DEFAULT_STEP_SIZE};
use crate::numeric::runge_kutta::RK4Integrator;
use crate::simulation::particle::SimulationError;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub spacetime: SpacetimeConfig,
    #[serde(default)]
    pub integrator: IntegratorConfig,
    #[serde(default = "default_metric_cache")]
    pub metric_cache: bool,
    pub worldline: WorldlineConfig,
    pub steps: usize,
    #[serde(default)]
    pub step: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub enum SpacetimeConfig {
    Schwarzschild {
        mass: f64,
        #[serde(default = "default_pole_threshold")]
        pole_threshold: f64,
        #[serde(default = "default_pole_radius_sq")]
        pole_radius_sq: f64,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub enum IntegratorConfig {
    RungeKutta4 {
        #[serde(default = "default_step_size")]
        step_size: f64,
    },
    DormandPrince {
        #[serde(default = "default_max_error")]
        max_error: f64,
        #[serde(default = "default_step_size")]
        step_size: f64,
        #[serde(default = "default_min_step")]
        min_step: f64,
        #[serde(default = "default_max_step")]
        max_step: f64,
    },
}

/// Initial state of the worldline. A `basis` makes it an oriented entity instead of a particle.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WorldlineConfig {
    pub chart: ChartId,
    pub position: [f64; 4],
    pub velocity: [f64; 4],
    pub basis: Option<[[f64; 4]; 3]>,
}

fn default_metric_cache() -> bool {
    true
}

fn default_pole_threshold() -> f64 {
    DEFAULT_POLE_THRESHOLD
}

fn default_pole_radius_sq() -> f64 {
    DEFAULT_POLE_RADIUS_SQ
}

fn default_step_size() -> f64 {
    DEFAULT_STEP_SIZE
}

fn default_max_error() -> f64 {
    DEFAULT_MAX_ERROR
}

fn default_min_step() -> f64 {
    DEFAULT_MIN_STEP
}

fn default_max_step() -> f64 {
    DEFAULT_MAX_STEP
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        IntegratorConfig::DormandPrince {
            max_error: DEFAULT_MAX_ERROR,
            step_size: DEFAULT_STEP_SIZE,
            min_step: DEFAULT_MIN_STEP,
            max_step: DEFAULT_MAX_STEP,
        }
    }
}

impl SimulationConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, SimulationError> {
        let config: SimulationConfig = toml::from_str(content)
            .map_err(|e| SimulationError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SimulationError> {
        let content = fs::read_to_string(path.as_ref())?;
        debug!("loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.steps == 0 {
            return Err(invalid("steps must be positive"));
        }
        if !(self.step >= 0.0) {
            return Err(invalid(format!("step must not be negative, got {}", self.step)));
        }
        self.spacetime.validate()?;
        self.integrator.validate()?;

        let n_charts = self.spacetime.n_charts();
        if self.worldline.chart >= n_charts {
            return Err(invalid(format!(
                "chart {} is not one of the {} charts of the spacetime",
                self.worldline.chart, n_charts
            )));
        }
        Ok(())
    }
}

impl SpacetimeConfig {
    pub fn n_charts(&self) -> usize {
        match self {
            SpacetimeConfig::Schwarzschild { .. } => 3,
        }
    }

    fn validate(&self) -> Result<(), SimulationError> {
        match self {
            SpacetimeConfig::Schwarzschild { mass, .. } => {
                if !(*mass >= 0.0) {
                    return Err(invalid(format!("mass must not be negative, got {}", mass)));
                }
            }
        }
        Ok(())
    }

    pub fn build(&self, metric_cache: bool) -> Result<Manifold, GeometryError> {
        match self {
            SpacetimeConfig::Schwarzschild {
                mass,
                pole_threshold,
                pole_radius_sq,
            } => Schwarzschild::new(*mass)
                .with_pole_thresholds(*pole_threshold, *pole_radius_sq)
                .with_cache(metric_cache)
                .build(),
        }
    }
}

impl IntegratorConfig {
    fn validate(&self) -> Result<(), SimulationError> {
        match *self {
            IntegratorConfig::RungeKutta4 { step_size } => {
                if !(step_size > 0.0) {
                    return Err(invalid(format!(
                        "step_size must be positive, got {}",
                        step_size
                    )));
                }
            }
            IntegratorConfig::DormandPrince {
                max_error,
                step_size,
                min_step,
                max_step,
            } => {
                if !(max_error > 0.0) {
                    return Err(invalid(format!(
                        "max_error must be positive, got {}",
                        max_error
                    )));
                }
                if !(step_size > 0.0) {
                    return Err(invalid(format!(
                        "step_size must be positive, got {}",
                        step_size
                    )));
                }
                if !(min_step > 0.0 && min_step <= max_step) {
                    return Err(invalid(format!(
                        "min_step {} and max_step {} do not form a step range",
                        min_step, max_step
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn build(&self) -> SharedIntegrator {
        match *self {
            IntegratorConfig::RungeKutta4 { step_size } => shared(RK4Integrator::new(step_size)),
            IntegratorConfig::DormandPrince {
                max_error,
                step_size,
                min_step,
                max_step,
            } => shared(DPIntegrator::new(max_error, step_size, min_step, max_step)),
        }
    }
}

impl WorldlineConfig {
    pub fn position(&self) -> Point {
        Point::from_slice(self.chart, &self.position)
    }

    pub fn velocity(&self) -> FourVector {
        FourVector::from_slice(&self.velocity)
    }

    pub fn basis(&self) -> Option<[FourVector; 3]> {
        self.basis.map(|basis| {
            [
                FourVector::from_slice(&basis[0]),
                FourVector::from_slice(&basis[1]),
                FourVector::from_slice(&basis[2]),
            ]
        })
    }
}

fn invalid<S: Into<String>>(message: S) -> SimulationError {
    SimulationError::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use crate::configuration::{IntegratorConfig, SimulationConfig, SpacetimeConfig};
    use crate::geometry::schwarzschild::{
        DEFAULT_POLE_RADIUS_SQ, DEFAULT_POLE_THRESHOLD, EDDINGTON_FINKELSTEIN,
    };
    use crate::numeric::dormand_prince::{DEFAULT_MAX_ERROR, DEFAULT_MAX_STEP, DEFAULT_MIN_STEP};
    use crate::numeric::integrator::Integrator;
    use crate::simulation::particle::SimulationError;

    const ENTITY: &str = r#"
        steps = 200
        step = 0.05
        metric_cache = false

        [spacetime.Schwarzschild]
        mass = 1.0
        pole_threshold = 0.4

        [integrator.RungeKutta4]
        step_size = 0.02

        [worldline]
        chart = 0
        position = [0.0, 10.0, 1.5, 0.0]
        velocity = [1.2, 0.0, 0.0, 0.1]
        basis = [
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    "#;

    #[test]
    fn test_deserialize() {
        let config = SimulationConfig::from_toml_str(ENTITY).unwrap();

        assert_eq!(config.steps, 200);
        assert_eq!(config.step, 0.05);
        assert!(!config.metric_cache);
        assert_eq!(
            config.spacetime,
            SpacetimeConfig::Schwarzschild {
                mass: 1.0,
                pole_threshold: 0.4,
                pole_radius_sq: DEFAULT_POLE_RADIUS_SQ,
            }
        );
        assert_eq!(
            config.integrator,
            IntegratorConfig::RungeKutta4 { step_size: 0.02 }
        );

        let position = config.worldline.position();
        assert_eq!(position.chart(), Some(EDDINGTON_FINKELSTEIN));
        assert_eq!(position[1], 10.0);
        assert_eq!(config.worldline.velocity()[3], 0.1);
        let basis = config.worldline.basis().unwrap();
        assert_eq!(basis[2][3], 1.0);
    }

    #[test]
    fn test_defaults() {
        let toml_str = r#"
            steps = 10

            [spacetime.Schwarzschild]
            mass = 0.5

            [worldline]
            chart = 1
            position = [0.0, 10.0, 0.1, 0.1]
            velocity = [1.0, 0.0, 0.0, 0.0]
        "#;

        let config = SimulationConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.step, 0.0);
        assert!(config.metric_cache);
        assert!(config.worldline.basis().is_none());
        assert_eq!(
            config.spacetime,
            SpacetimeConfig::Schwarzschild {
                mass: 0.5,
                pole_threshold: DEFAULT_POLE_THRESHOLD,
                pole_radius_sq: DEFAULT_POLE_RADIUS_SQ,
            }
        );
        assert_eq!(
            config.integrator,
            IntegratorConfig::DormandPrince {
                max_error: DEFAULT_MAX_ERROR,
                step_size: 0.01,
                min_step: DEFAULT_MIN_STEP,
                max_step: DEFAULT_MAX_STEP,
            }
        );
    }

    #[test]
    fn test_partial_integrator_defaults() {
        let toml_str = r#"
            steps = 10

            [spacetime.Schwarzschild]
            mass = 1.0

            [integrator.DormandPrince]
            max_error = 1e-9

            [worldline]
            chart = 0
            position = [0.0, 10.0, 1.5, 0.0]
            velocity = [1.2, 0.0, 0.0, 0.0]
        "#;

        let config = SimulationConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(
            config.integrator,
            IntegratorConfig::DormandPrince {
                max_error: 1e-9,
                step_size: 0.01,
                min_step: DEFAULT_MIN_STEP,
                max_step: DEFAULT_MAX_STEP,
            }
        );
        assert_eq!(config.integrator.build().borrow().step_size(), 0.01);
    }

    fn with(replacement: (&str, &str)) -> Result<SimulationConfig, SimulationError> {
        SimulationConfig::from_toml_str(&ENTITY.replace(replacement.0, replacement.1))
    }

    #[test]
    fn test_validation() {
        for replacement in [
            ("steps = 200", "steps = 0"),
            ("step = 0.05", "step = -0.05"),
            ("mass = 1.0", "mass = -1.0"),
            ("chart = 0", "chart = 3"),
            ("step_size = 0.02", "step_size = 0.0"),
        ] {
            assert!(
                matches!(with(replacement), Err(SimulationError::Configuration(_))),
                "{:?} should be rejected",
                replacement
            );
        }

        let toml_str = ENTITY.replace(
            "[integrator.RungeKutta4]\n        step_size = 0.02",
            "[integrator.DormandPrince]\n        min_step = 0.5\n        max_step = 0.1",
        );
        assert!(matches!(
            SimulationConfig::from_toml_str(&toml_str),
            Err(SimulationError::Configuration(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            SimulationConfig::from_toml_str("steps = \"many\""),
            Err(SimulationError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_manifold() {
        let config = SimulationConfig::from_toml_str(ENTITY).unwrap();
        let manifold = config.spacetime.build(config.metric_cache).unwrap();

        assert_eq!(manifold.n_charts(), 3);
        assert!(!manifold.metric(EDDINGTON_FINKELSTEIN).unwrap().is_cached());
    }
}
