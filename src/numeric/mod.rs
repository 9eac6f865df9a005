pub mod dormand_prince;
pub mod integrator;
pub mod runge_kutta;
