//! Logger setup

/// Map verbosity flags to a level filter.
///
/// `quiet` wins over any verbosity.
pub const fn level_filter(verbose: u8, quiet: bool) -> log::LevelFilter {
    if quiet {
        return log::LevelFilter::Error;
    }
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Install `env_logger` for the process.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(verbose: u8, quiet: bool) {
    let _ = env_logger::Builder::new()
        .filter_level(level_filter(verbose, quiet))
        .format_timestamp(None)
        .try_init();
}
