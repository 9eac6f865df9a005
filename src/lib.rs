pub mod cli;
pub mod configuration;
pub mod geometry;
pub mod numeric;
pub mod simulation;
