use std::io::Write;

use env_logger::Logger;
use log::LevelFilter;

/// Installs the global logger.
///
/// Info messages are printed by default, debug messages with `debug`. Filters from `RUST_LOG`
/// take precedence over both.
pub fn setup_logging(debug: bool) {
    let logger = create_logger(debug);
    let max_level = logger.filter();
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
}

fn create_logger(debug: bool) -> Logger {
    let mut builder = env_logger::Builder::default();
    if debug {
        builder
            .filter_level(LevelFilter::Debug)
            .format_timestamp_millis()
            .format_module_path(true);
    } else {
        // <time> <level> <message>
        builder.filter_level(LevelFilter::Info).format(|buf, record| {
            let level_style = buf.default_level_style(record.level()).bold();
            writeln!(
                buf,
                "{} {level_style}{}{level_style:#} {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        });
    }
    builder.parse_default_env();
    builder.build()
}
