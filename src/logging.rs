use anyhow::Context;
use chrono::Local;
use log::LevelFilter;
use log4rs::Handle;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

const LOG_FOLDER: &str = "logs";
const PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S)}][{l}][mailpipe] {m}{n}";

/// Level used when extended logging is off. Errors and warnings only
pub const QUIET: LevelFilter = LevelFilter::Warn;

pub fn level_for(extended_logging: bool) -> LevelFilter {
    if extended_logging {
        LevelFilter::Info
    } else {
        QUIET
    }
}

/// One file per day, the date is fixed at startup
fn log_file_path() -> String {
    format!("{LOG_FOLDER}/mailpipe_{}.log", Local::now().format("%d-%m-%Y"))
}

fn build_config(level: LevelFilter) -> anyhow::Result<Config> {
    // Build a stderr logger.
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    // Appends to the file for today (Creates folder if needed)
    let file_path = log_file_path();
    let log_file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(&file_path)
        .with_context(|| format!("Failed to open log file {file_path:?}"))?;

    let config = Config::builder()
        .appender(Appender::builder().build("log_file", Box::new(log_file)))
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(
            Root::builder()
                .appender("log_file")
                .appender("stderr")
                .build(level),
        )
        .context("Failed to configure logging")?;
    Ok(config)
}

/// Starts logging at `level`. Use the returned handle with [`set_level`] once the real level is known
pub fn init_logging(level: LevelFilter) -> anyhow::Result<Handle> {
    let config = build_config(level)?;
    let handle = log4rs::init_config(config).context("Failed to init_config")?;
    Ok(handle)
}

pub fn set_level(handle: &Handle, level: LevelFilter) -> anyhow::Result<()> {
    handle.set_config(build_config(level)?);
    Ok(())
}
