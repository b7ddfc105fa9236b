use clap::{Parser, Subcommand};

/// Generates ensembles of multi-member district maps and runs ranked-choice
/// elections on them.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Groups the single-member districts of the graph into a multi-member seed map.
    Seed {
        /// (file path) The run configuration in JSON format.
        #[clap(short, long, value_parser)]
        config: String,
        /// (file path, optional) Where to write the seed map. Overrides `seed.filePath`.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
    /// Generates an ensemble of maps from the seed map.
    Ensemble {
        /// (file path) The run configuration in JSON format.
        #[clap(short, long, value_parser)]
        config: String,
        /// (file path, optional) The seed map. Overrides `seed.filePath`.
        #[clap(short, long, value_parser)]
        seed: Option<String>,
        /// (directory, optional) Overrides `outputDirectory`.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (seconds, optional) Stops the generation after this time and writes the maps
        /// completed so far.
        #[clap(long, value_parser)]
        time_limit: Option<u64>,
    },
    /// Runs one statewide election on every map of an ensemble.
    Elections {
        /// (file path) The run configuration in JSON format.
        #[clap(short, long, value_parser)]
        config: String,
        /// (file path, optional) The ensemble file. By default, the ensemble that
        /// `mmdsim ensemble` writes for the same configuration.
        #[clap(short, long, value_parser)]
        ensemble: Option<String>,
        /// (directory, optional) Overrides `outputDirectory`.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
    /// Tabulates a single ranked-choice election from a ballots file.
    Tabulate {
        /// (file path) The ballots file in JSON format.
        #[clap(short, long, value_parser)]
        input: String,
        /// (file path) A reference file containing the outcome of the election in JSON
        /// format. If provided, mmdsim will check that the tabulated output matches the
        /// reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
        /// (file path, 'stdout' or empty) If specified, the summary of the election will be
        /// written in JSON format to the given location.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
}
