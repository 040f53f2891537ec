use batch_logging::LogDestination;
use log::LevelFilter;

use crate::cli::Cli;

/// Terminal gets warnings by default; each `-v` opens one more level.
pub(crate) fn init(args: &Cli) {
    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let destination = match &args.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    batch_logging::initialize(destination, level);
}
