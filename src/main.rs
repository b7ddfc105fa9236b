mod args;
mod sim;

use clap::Parser;
use log::{debug, error};
use snafu::ErrorCompat;

use crate::args::{Args, Command};

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    debug!("args: {:?}", args);

    let res = match args.command {
        Command::Seed { config, out } => sim::run_seed(&config, out),
        Command::Ensemble {
            config,
            seed,
            out,
            time_limit,
        } => sim::run_ensemble(&config, seed, out, time_limit),
        Command::Elections {
            config,
            ensemble,
            out,
        } => sim::run_elections(&config, ensemble, out),
        Command::Tabulate {
            input,
            reference,
            out,
        } => sim::run_tabulate(&input, reference, out),
    };

    if let Err(e) = res {
        error!("{}", e);
        eprintln!("An error occurred {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
