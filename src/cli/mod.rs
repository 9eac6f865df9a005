pub mod cli;
pub mod shapiro;
pub mod trace;
