use clap::{Args as ClapArgs, Parser, Subcommand};

/// Audit of scanned paper ballots: reads the bubbles of each ballot, tallies
/// the precincts and compares them with the official results.
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
    /// Measures the bubbles of all the ballots of a directory of batches (.zip or .pbm files).
    /// Batches already present in the store are skipped, so an interrupted scan can be resumed.
    Scan {
        /// (directory) The directory containing the batches of scanned ballots.
        #[clap(short, long, value_parser)]
        input: String,
        /// (directory) Where the measurements are stored. Created if it does not exist.
        #[clap(short, long, value_parser)]
        store: String,
        /// (default: number of cores) The number of batches processed in parallel.
        #[clap(short, long, value_parser)]
        jobs: Option<usize>,
        /// (file path, optional) The configuration of the ballot layout, in JSON.
        #[clap(short, long, value_parser)]
        config: Option<String>,
    },
    /// Classifies the stored ballots and prints the tally of each precinct, grouped by locality.
    Tally {
        /// (directory) The store written by the scan command.
        #[clap(short, long, value_parser)]
        store: String,
        #[clap(flatten)]
        report: ReportArgs,
    },
    /// Compares the audited precincts with the official results.
    Reconcile {
        /// (directory) The store written by the scan command.
        #[clap(short, long, value_parser)]
        store: String,
        /// (file path) The official results, as a CSV or Excel (.xlsx) file with a 'Precinct' column.
        #[clap(long, value_parser)]
        official: String,
        #[clap(flatten)]
        report: ReportArgs,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ReportArgs {
    /// (file path, optional) The configuration, in JSON.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// The low darkness threshold. Overrides the configuration.
    #[clap(long, value_parser)]
    pub low: Option<u64>,

    /// The high darkness threshold. Overrides the configuration.
    #[clap(long, value_parser)]
    pub high: Option<u64>,

    /// (file path, 'stdout' or empty) Where to write the summary in JSON format.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, the output is
    /// checked against it.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,
}
