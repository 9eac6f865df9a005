// Stereographic projection of the unit sphere from one of its poles.
//
// Angles are the usual polar angle theta in [0, pi] and azimuth phi. The projection around the
// north pole maps (theta, phi) to x = tan(theta/2) cos(phi), y = tan(theta/2) sin(phi). The south
// pole projection uses pi - theta instead of theta and keeps phi, so both pole charts have the
// same orientation of (x, y) as the azimuth.
//
// Jacobian blocks are 2x2, row-major, `d(new_i)/d(old_j)` of the named map at the given point.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pole {
    North,
    South,
}

impl Pole {
    pub fn sign(self) -> f64 {
        match self {
            Pole::North => 1.0,
            Pole::South => -1.0,
        }
    }

    pub fn opposite(self) -> Pole {
        match self {
            Pole::North => Pole::South,
            Pole::South => Pole::North,
        }
    }

    pub fn colatitude(self, theta: f64) -> f64 {
        match self {
            Pole::North => theta,
            Pole::South => std::f64::consts::PI - theta,
        }
    }
}

pub fn angles_to_stereographic(pole: Pole, theta: f64, phi: f64) -> (f64, f64) {
    let tau = (0.5 * pole.colatitude(theta)).tan();
    (tau * phi.cos(), tau * phi.sin())
}

pub fn stereographic_to_angles(pole: Pole, x: f64, y: f64) -> (f64, f64) {
    let rho = x.hypot(y);
    let theta = pole.colatitude(2.0 * rho.atan());
    (theta, y.atan2(x))
}

/// Maps the projection from one pole onto the projection from the opposite pole.
pub fn invert(x: f64, y: f64) -> (f64, f64) {
    let rho_sq = x * x + y * y;
    (x / rho_sq, y / rho_sq)
}

/// `alpha^2` in `d theta^2 + sin^2 theta d phi^2 = alpha^2 (dx^2 + dy^2)`.
pub fn conformal_factor(x: f64, y: f64) -> f64 {
    let s = 1.0 + x * x + y * y;
    4.0 / (s * s)
}

/// `d(x, y)/d(theta, phi)`.
pub fn angles_to_stereographic_jacobian(pole: Pole, theta: f64, phi: f64) -> [f64; 4] {
    let half = 0.5 * pole.colatitude(theta);
    let tau = half.tan();
    let d_tau = pole.sign() * 0.5 / (half.cos() * half.cos());
    let (sin_phi, cos_phi) = phi.sin_cos();

    [
        d_tau * cos_phi,
        -tau * sin_phi,
        d_tau * sin_phi,
        tau * cos_phi,
    ]
}

/// `d(theta, phi)/d(x, y)`. Singular at the pole itself.
pub fn stereographic_to_angles_jacobian(pole: Pole, x: f64, y: f64) -> [f64; 4] {
    let rho_sq = x * x + y * y;
    let rho = rho_sq.sqrt();
    let d_theta = pole.sign() * 2.0 / (1.0 + rho_sq);

    [
        d_theta * x / rho,
        d_theta * y / rho,
        -y / rho_sq,
        x / rho_sq,
    ]
}

/// `d(x', y')/d(x, y)` of [`invert`].
pub fn inversion_jacobian(x: f64, y: f64) -> [f64; 4] {
    let rho_sq = x * x + y * y;
    let rho_4 = rho_sq * rho_sq;

    [
        (y * y - x * x) / rho_4,
        -2.0 * x * y / rho_4,
        -2.0 * x * y / rho_4,
        (x * x - y * y) / rho_4,
    ]
}
