use clap::{Args, Parser, Subcommand};

#[derive(Debug, Args, Clone)]
pub struct ShapiroOpts {
    /// Mass of the central body in light-seconds (geometric units).
    #[arg(long, default_value = "4.9e-6")]
    pub mass: f64,
    /// Closest approach of the ray in light-seconds.
    #[arg(long, default_value = "2.33")]
    pub perihelion: f64,
    /// `sqrt(rV^2 - d^2)` for the distance rV of Venus.
    #[arg(long, default_value = "370.7")]
    pub y_venus: f64,
    /// `sqrt(rE^2 - d^2)` for the distance rE of Earth.
    #[arg(long, default_value = "498.67")]
    pub y_earth: f64,
    #[arg(long, default_value = "1e-12")]
    pub max_error: f64,
    #[arg(long, default_value = "1000000")]
    pub max_steps: usize,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct App {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Action {
    /// Propagates the worldline of a configuration file and writes its trajectory as CSV.
    Trace {
        #[arg(short, long)]
        config_file: String,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Shapiro delay of a radar signal grazing the sun on its way from Earth to Venus.
    Shapiro {
        #[command(flatten)]
        opts: ShapiroOpts,
    },
}
