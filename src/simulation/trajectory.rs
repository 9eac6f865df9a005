use crate::geometry::four_vector::FourVector;
use crate::geometry::point::Point;
use crate::simulation::particle::{SimulationError, Worldline};
use log::debug;
use std::io::Write;
use std::ops::Index;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectoryStep {
    pub index: usize,
    pub proper_time: f64,
    pub position: Point,
    pub velocity: FourVector,
}

#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    steps: Vec<TrajectoryStep>,
}

impl Trajectory {
    pub fn record(&mut self, worldline: &dyn Worldline) {
        self.steps.push(TrajectoryStep {
            index: self.steps.len(),
            proper_time: worldline.proper_time(),
            position: worldline.position(),
            velocity: worldline.velocity(),
        });
    }

    /// Records the initial state and then the state after each of `steps` calls to `propagate`.
    pub fn trace(
        worldline: &mut dyn Worldline,
        steps: usize,
        dt: f64,
    ) -> Result<Self, SimulationError> {
        let mut trajectory = Trajectory {
            steps: Vec::with_capacity(steps + 1),
        };
        trajectory.record(worldline);
        for _ in 0..steps {
            worldline.propagate(dt)?;
            trajectory.record(worldline);
        }
        debug!(
            "traced {} steps up to tau = {}",
            steps,
            worldline.proper_time()
        );
        Ok(trajectory)
    }

    pub fn save(&self, write: &mut dyn Write) -> Result<(), SimulationError> {
        write.write_all(b"i,tau,chart,x0,x1,x2,x3\n")?;

        for step in &self.steps {
            let chart = step
                .position
                .chart()
                .map_or_else(|| "-".to_string(), |chart| chart.to_string());
            write.write_all(
                format!(
                    "{},{},{},{},{},{},{}\n",
                    step.index,
                    step.proper_time,
                    chart,
                    step.position[0],
                    step.position[1],
                    step.position[2],
                    step.position[3],
                )
                .as_bytes(),
            )?;
        }
        write.flush()?;
        Ok(())
    }

    pub fn steps(&self) -> &[TrajectoryStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&TrajectoryStep> {
        self.steps.last()
    }
}

impl Index<usize> for Trajectory {
    type Output = TrajectoryStep;

    fn index(&self, index: usize) -> &Self::Output {
        &self.steps[index]
    }
}
