use nalgebra::Vector4;
use std::ops::{Index, IndexMut};

pub type ChartId = usize;

/// A point on a manifold, given by four coordinates in one chart.
///
/// A point without a chart is invalid and never compares equal to anything, not even to itself.
/// Points in different charts compare unequal here; use
/// [`crate::geometry::manifold::Manifold::same_point`] to compare them across charts.
#[derive(Clone, Copy, Debug)]
pub struct Point {
    chart: Option<ChartId>,
    pub vector: Vector4<f64>,
}

impl Default for Point {
    fn default() -> Self {
        Point::invalid()
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        match (self.chart, other.chart) {
            (Some(a), Some(b)) => a == b && self.vector == other.vector,
            _ => false,
        }
    }
}

impl Point {
    pub fn new(chart: ChartId, x0: f64, x1: f64, x2: f64, x3: f64) -> Point {
        Point {
            chart: Some(chart),
            vector: Vector4::new(x0, x1, x2, x3),
        }
    }

    pub fn new_from_vector(chart: ChartId, vector: Vector4<f64>) -> Point {
        Point {
            chart: Some(chart),
            vector,
        }
    }

    pub fn from_slice(chart: ChartId, coordinates: &[f64]) -> Point {
        Point {
            chart: Some(chart),
            vector: Vector4::from_column_slice(coordinates),
        }
    }

    pub fn invalid() -> Point {
        Point {
            chart: None,
            vector: Vector4::zeros(),
        }
    }

    pub fn chart(&self) -> Option<ChartId> {
        self.chart
    }

    pub fn is_valid(&self) -> bool {
        self.chart.is_some()
    }

    pub fn shifted(&self, k: usize, delta: f64) -> Point {
        let mut shifted = *self;
        shifted.vector[k] += delta;
        shifted
    }
}

impl Index<usize> for Point {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.vector[index]
    }
}

impl IndexMut<usize> for Point {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.vector[index]
    }
}
