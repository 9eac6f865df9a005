use clap::Parser;
use gr_worldlines::cli::cli::{Action, App};
use gr_worldlines::cli::shapiro::shapiro;
use gr_worldlines::cli::trace::trace;
use gr_worldlines::configuration::SimulationConfig;
use gr_worldlines::simulation::particle::SimulationError;
use log::error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

fn run(app: App) -> Result<(), SimulationError> {
    match app.action {
        Action::Trace {
            config_file,
            output,
        } => {
            let config = SimulationConfig::load(&config_file)?;
            let mut write: Box<dyn Write> = match output {
                Some(filename) => Box::new(BufWriter::new(File::create(filename)?)),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };
            trace(&config, write.as_mut())?;
        }
        Action::Shapiro { opts } => {
            let mut write = BufWriter::new(io::stdout().lock());
            shapiro(&opts, &mut write)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(App::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
