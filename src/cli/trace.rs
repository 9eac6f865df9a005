use crate::configuration::{SimulationConfig, WorldlineConfig};
use crate::geometry::manifold::Manifold;
use crate::numeric::integrator::SharedIntegrator;
use crate::simulation::entity::Entity;
use crate::simulation::particle::{Particle, SimulationError, Worldline};
use crate::simulation::trajectory::Trajectory;
use log::{debug, info};
use std::io::Write;

fn create_worldline<'m>(
    manifold: &'m Manifold,
    config: &WorldlineConfig,
    integrator: SharedIntegrator,
) -> Result<Box<dyn Worldline + 'm>, SimulationError> {
    let position = config.position();
    let velocity = config.velocity();
    match config.basis() {
        Some([x, y, z]) => {
            debug!("Creating entity at {:?}", position);
            let mut entity = Entity::new(manifold, position, velocity, x, y, z)?;
            entity.set_integrator(integrator);
            Ok(Box::new(entity))
        }
        None => {
            debug!("Creating particle at {:?}", position);
            let mut particle = Particle::new(manifold, position, velocity)?;
            particle.set_integrator(integrator);
            Ok(Box::new(particle))
        }
    }
}

pub fn trace(
    config: &SimulationConfig,
    write: &mut dyn Write,
) -> Result<Trajectory, SimulationError> {
    let manifold = config.spacetime.build(config.metric_cache)?;
    let integrator = config.integrator.build();
    let mut worldline = create_worldline(&manifold, &config.worldline, integrator)?;

    let trajectory = Trajectory::trace(worldline.as_mut(), config.steps, config.step)?;
    info!(
        "Traced {} steps, tau = {}, final position {:?}",
        config.steps,
        worldline.proper_time(),
        worldline.position()
    );
    trajectory.save(write)?;
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use crate::cli::trace::trace;
    use crate::configuration::SimulationConfig;
    use crate::geometry::schwarzschild::{schwarzschild_manifold, NORTH_POLE};
    use approx::assert_abs_diff_eq;
    use std::io::BufWriter;

    #[test]
    fn test_trace_particle() {
        let config = SimulationConfig::from_toml_str(
            r#"
            steps = 20
            step = 0.1

            [spacetime.Schwarzschild]
            mass = 1.0

            [integrator.RungeKutta4]
            step_size = 0.1

            [worldline]
            chart = 0
            position = [0.0, 10.0, 1.5707963267948966, 0.0]
            velocity = [1.118033988749895, 0.0, 0.0, 0.0]
            "#,
        )
        .unwrap();

        let mut write = BufWriter::new(Vec::new());
        let trajectory = trace(&config, &mut write).unwrap();
        let bytes = write.into_inner().unwrap();
        let output = String::from_utf8(bytes).unwrap();

        assert_eq!(output.lines().count(), 22);
        assert_eq!(output.lines().next(), Some("i,tau,chart,x0,x1,x2,x3"));
        assert_eq!(trajectory.len(), 21);
        // A particle released at rest falls inwards.
        assert!(trajectory.last().unwrap().position[1] < 10.0);
        assert_abs_diff_eq!(trajectory.last().unwrap().proper_time, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_trace_entity_through_pole_chart() {
        let config = SimulationConfig::from_toml_str(
            r#"
            steps = 30

            [spacetime.Schwarzschild]
            mass = 1.0

            [integrator.RungeKutta4]
            step_size = 0.1

            [worldline]
            chart = 0
            position = [0.0, 10.0, 0.52, 0.3]
            velocity = [1.2, 0.0, -0.05, 0.0]
            basis = [
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ]
            "#,
        )
        .unwrap();

        let mut write = BufWriter::new(Vec::new());
        let trajectory = trace(&config, &mut write).unwrap();

        assert!(trajectory
            .steps()
            .iter()
            .any(|step| step.position.chart() == Some(NORTH_POLE)));

        let manifold = schwarzschild_manifold(1.0).unwrap();
        let last = trajectory.last().unwrap();
        let norm = manifold
            .inner_product(&last.velocity, &last.velocity, &last.position)
            .unwrap();
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-9);
    }
}
