use crate::geometry::point::{ChartId, Point};
use nalgebra::Matrix4;

pub const DIMENSION: usize = 4;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Index {index} out of bounds (must be below {bound})")]
    IndexOutOfBounds { index: usize, bound: usize },
    #[error("Invalid coordinate system: expected chart {expected}, got {found:?}")]
    InvalidCoordinateSystem {
        expected: String,
        found: Option<ChartId>,
    },
    #[error("Invalid manifold: {0}")]
    InvalidManifold(String),
    #[error("Tetrad is not orthonormal")]
    TetradNotOrthonormal,
}

pub fn check_tensor_index(index: usize) -> Result<(), GeometryError> {
    check_index(index, DIMENSION)
}

pub fn check_index(index: usize, bound: usize) -> Result<(), GeometryError> {
    if index >= bound {
        return Err(GeometryError::IndexOutOfBounds { index, bound });
    }
    Ok(())
}

pub fn require_chart(point: &Point, chart: ChartId) -> Result<(), GeometryError> {
    if point.chart() != Some(chart) {
        return Err(GeometryError::InvalidCoordinateSystem {
            expected: chart.to_string(),
            found: point.chart(),
        });
    }
    Ok(())
}

/// Transformation between two charts of the same manifold.
///
/// Both Jacobians are evaluated at a point expressed in the source chart:
/// `jacobian(i, j) = d(old_i)/d(new_j)` and `inv_jacobian(i, j) = d(new_i)/d(old_j)`.
pub trait CoordinateConversion {
    fn convert_point(&self, point: &Point) -> Result<Point, GeometryError>;

    fn jacobian_matrix(&self, point: &Point) -> Result<Matrix4<f64>, GeometryError>;

    fn inv_jacobian_matrix(&self, point: &Point) -> Result<Matrix4<f64>, GeometryError>;

    fn jacobian(&self, i: usize, j: usize, point: &Point) -> Result<f64, GeometryError> {
        check_tensor_index(i)?;
        check_tensor_index(j)?;
        Ok(self.jacobian_matrix(point)?[(i, j)])
    }

    fn inv_jacobian(&self, i: usize, j: usize, point: &Point) -> Result<f64, GeometryError> {
        check_tensor_index(i)?;
        check_tensor_index(j)?;
        Ok(self.inv_jacobian_matrix(point)?[(i, j)])
    }
}

/// Closed-form components of a metric in one chart.
///
/// Indices passed in are already validated and canonicalized (`i <= j` for the metric and its
/// inverse, `j <= k` for the Christoffel symbols), and the point is already expressed in the
/// metric's chart.
pub trait MetricFormula {
    fn component(&self, i: usize, j: usize, point: &Point) -> f64;

    fn inverse_component(&self, i: usize, j: usize, point: &Point) -> f64;

    /// `Gamma^i_jk`. Returning `None` makes the metric fall back to finite differences of the
    /// metric components.
    fn christoffel_component(&self, _i: usize, _j: usize, _k: usize, _point: &Point) -> Option<f64> {
        None
    }
}
