use clap::Parser;
use log::{debug, LevelFilter};
use snafu::ErrorCompat;
use std::error::Error;

mod args;
mod audit;

use crate::args::{Args, Command};

fn main() {
    let args = Args::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
    debug!("main: args: {:?}", args);

    let res = match args.command {
        Command::Scan {
            input,
            store,
            jobs,
            config,
        } => audit::run_scan(&input, &store, jobs, config.as_deref()),
        Command::Tally { store, report } => audit::run_tally(&store, &report),
        Command::Reconcile {
            store,
            official,
            report,
        } => audit::run_reconcile(&store, &official, &report),
    };

    if let Err(e) = res {
        eprintln!("An error occured: {}", e);
        let mut source = e.source();
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        if let Some(bt) = ErrorCompat::backtrace(e.as_ref()) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
