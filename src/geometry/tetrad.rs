use crate::geometry::four_vector::FourVector;
use crate::geometry::geometry::GeometryError;
use crate::geometry::manifold::Manifold;
use crate::geometry::point::Point;
use log::debug;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tetrad {
    pub position: Point,
    pub t: FourVector,
    pub x: FourVector,
    pub y: FourVector,
    pub z: FourVector,
}

impl Tetrad {
    pub fn new(
        position: Point,
        t: FourVector,
        x: FourVector,
        y: FourVector,
        z: FourVector,
    ) -> Self {
        Tetrad {
            position,
            t,
            x,
            y,
            z,
        }
    }

    pub fn vectors(&self) -> [FourVector; 4] {
        [self.t, self.x, self.y, self.z]
    }
}

impl Display for Tetrad {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tetrad")?;
        writeln!(f, "  position: {:?}", self.position)?;
        writeln!(f, "  t: {:?}", self.t)?;
        writeln!(f, "  x: {:?}", self.x)?;
        writeln!(f, "  y: {:?}", self.y)?;
        writeln!(f, "  z: {:?}", self.z)?;
        Ok(())
    }
}

/// Checks that a tetrad is orthonormal, i.e. `|g(a, a)| = 1` and `g(a, b) = 0` for `a != b`.
pub struct TetradValidator<'a> {
    manifold: &'a Manifold,
    tolerance: f64,
}

fn is_approx_equal(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

impl<'a> TetradValidator<'a> {
    pub fn new(manifold: &'a Manifold) -> TetradValidator<'a> {
        TetradValidator {
            manifold,
            tolerance: 1e-5,
        }
    }

    pub fn validate(&self, tetrad: &Tetrad) -> Result<(), GeometryError> {
        let vectors = tetrad.vectors();
        let names = ["t", "x", "y", "z"];

        debug!("tetrad: {}", tetrad);
        debug!("inner product checks for tetrad:");
        let mut is_orthonormal = true;
        for a in 0..4 {
            for b in a..4 {
                let product =
                    self.manifold
                        .inner_product(&vectors[a], &vectors[b], &tetrad.position)?;
                debug!("  inner product {}.{}: {:.5}", names[a], names[b], product);
                let ok = if a == b {
                    is_approx_equal(product.abs(), 1.0, self.tolerance)
                } else {
                    is_approx_equal(product, 0.0, self.tolerance)
                };
                is_orthonormal &= ok;
            }
        }
        debug!("  is_orthonormal: {:?}", is_orthonormal);

        if !is_orthonormal {
            return Err(GeometryError::TetradNotOrthonormal);
        }

        Ok(())
    }
}
