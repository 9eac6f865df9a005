use crate::geometry::geometry::{require_chart, CoordinateConversion, GeometryError};
use crate::geometry::point::{ChartId, Point};
use nalgebra::Matrix4;

pub struct IdentityConversion {
    chart: ChartId,
}

impl IdentityConversion {
    pub fn new(chart: ChartId) -> Self {
        IdentityConversion { chart }
    }
}

impl CoordinateConversion for IdentityConversion {
    fn convert_point(&self, point: &Point) -> Result<Point, GeometryError> {
        require_chart(point, self.chart)?;
        Ok(*point)
    }

    fn jacobian_matrix(&self, point: &Point) -> Result<Matrix4<f64>, GeometryError> {
        require_chart(point, self.chart)?;
        Ok(Matrix4::identity())
    }

    fn inv_jacobian_matrix(&self, point: &Point) -> Result<Matrix4<f64>, GeometryError> {
        require_chart(point, self.chart)?;
        Ok(Matrix4::identity())
    }
}

/// Jacobian of a conversion that leaves the first two coordinates untouched and mixes the last two
/// through the given 2x2 block (row-major).
pub fn angular_block(block: [f64; 4]) -> Matrix4<f64> {
    #[rustfmt::skip]
    let data = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, block[0], block[1],
        0.0, 0.0, block[2], block[3],
    ];
    Matrix4::from_row_slice(&data)
}
