// Logging utilities for CLI
use std::io::Write;

/// Initialize logger for CLI
pub fn init_logger(verbose: bool, quiet: bool) {
    // RUST_LOG wins over the flags, for every crate
    if std::env::var("RUST_LOG").is_ok() {
        return env_logger::init();
    }

    let default_level = if quiet {
        log::LevelFilter::Error
    } else if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    let mut builder = env_logger::Builder::new();

    builder.filter_level(default_level).format(|buf, record| {
        if record.level() <= log::Level::Warn {
            writeln!(buf, "[{}] {}", record.level(), record.args())
        } else {
            writeln!(buf, "{}", record.args())
        }
    });

    // Debug from this crate only; HTTP stack stays at Info
    if verbose {
        builder.filter_module("wayback_fallback", log::LevelFilter::Debug);
        builder.filter_module("reqwest", log::LevelFilter::Info);
        builder.filter_module("hyper", log::LevelFilter::Info);
        builder.filter_module("h2", log::LevelFilter::Info);
        builder.filter_module("tokio", log::LevelFilter::Info);
    }

    builder.init();
}
