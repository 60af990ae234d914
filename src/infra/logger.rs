use crate::domain::models::LogLevel;
use env_logger::{Builder, Target};
use log::Level;
use std::io::Write;

pub const LOG_LEVEL_ENV: &str = "THINKTANK_LOG_LEVEL";

pub fn level_filter(verbose: bool, log_level: LogLevel) -> &'static str {
    if verbose {
        LogLevel::Debug.as_filter()
    } else {
        log_level.as_filter()
    }
}

/// Debug and trace lines carry the emitting module.
fn line_prefix(level: Level, target: &str) -> String {
    match level {
        Level::Debug | Level::Trace => format!("{:<5} {}", level.as_str().to_lowercase(), target),
        _ => format!("{:<5}", level.as_str().to_lowercase()),
    }
}

/// Logs go to stderr; stdout is reserved for the report and generated text.
pub fn setup_logger(verbose: bool, log_level: LogLevel) -> Result<(), log::SetLoggerError> {
    let env = env_logger::Env::default().filter_or(LOG_LEVEL_ENV, level_filter(verbose, log_level));

    Builder::from_env(env)
        .target(Target::Stderr)
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{style}{}{style:#} {}",
                line_prefix(record.level(), record.target()),
                record.args()
            )
        })
        .try_init()
}
