use nalgebra::{Vector3, Vector4};
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct FourVector {
    pub vector: Vector4<f64>,
}

impl Neg for FourVector {
    type Output = Self;

    fn neg(self) -> Self::Output {
        FourVector {
            vector: self.vector.neg(),
        }
    }
}

impl Add for FourVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        FourVector {
            vector: self.vector + rhs.vector,
        }
    }
}

impl AddAssign for FourVector {
    fn add_assign(&mut self, rhs: Self) {
        self.vector += rhs.vector;
    }
}

impl Sub for FourVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        FourVector {
            vector: self.vector - rhs.vector,
        }
    }
}

impl SubAssign for FourVector {
    fn sub_assign(&mut self, rhs: Self) {
        self.vector -= rhs.vector;
    }
}

impl Mul<FourVector> for f64 {
    type Output = FourVector;

    fn mul(self, f: FourVector) -> FourVector {
        FourVector {
            vector: self * f.vector,
        }
    }
}

impl Mul<f64> for FourVector {
    type Output = Self;

    fn mul(self, f: f64) -> Self {
        FourVector {
            vector: f * self.vector,
        }
    }
}

impl MulAssign<f64> for FourVector {
    fn mul_assign(&mut self, rhs: f64) {
        self.vector *= rhs;
    }
}

impl Div<f64> for FourVector {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        FourVector {
            vector: self.vector / rhs,
        }
    }
}

impl DivAssign<f64> for FourVector {
    fn div_assign(&mut self, rhs: f64) {
        self.vector /= rhs;
    }
}

impl Index<usize> for FourVector {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.vector[index]
    }
}

impl IndexMut<usize> for FourVector {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.vector[index]
    }
}

impl FourVector {
    pub fn new(x0: f64, x1: f64, x2: f64, x3: f64) -> FourVector {
        FourVector {
            vector: Vector4::new(x0, x1, x2, x3),
        }
    }

    pub fn zero() -> FourVector {
        FourVector {
            vector: Vector4::zeros(),
        }
    }

    pub fn from_vector(vector: Vector4<f64>) -> FourVector {
        FourVector { vector }
    }

    pub fn from_slice(components: &[f64]) -> FourVector {
        FourVector {
            vector: Vector4::from_column_slice(components),
        }
    }

    pub fn get_spatial_vector(self) -> Vector3<f64> {
        Vector3::new(self.vector[1], self.vector[2], self.vector[3])
    }
}
