mod cli;
pub mod config;
pub mod dispatch;
pub mod logging;
pub mod message;
pub mod reader;

use std::io::{self, BufRead};

use anyhow::Context;
use log4rs::Handle;

pub use cli::Cli;
use config::Config;
use dispatch::{dispatch, Delivery, SmtpRelay, Transport};
use reader::Ending;

/// Resolves config, applies options then sends what arrives on stdin
pub fn run(cli: Cli, logging_handle: &Handle) -> anyhow::Result<()> {
    let resolved = Config::resolve(&cli.get_config_path())?;
    let mut config = resolved.config;
    cli.apply_to(&mut config);
    logging::set_level(logging_handle, logging::level_for(config.extended_logging))
        .context("Failed to apply log level")?;
    resolved.source.report();
    cli.report();

    deliver(&cli, &config, relay_for, io::stdin().lock())?;
    Ok(())
}

/// The SMTP relay, only created when email is enabled
fn relay_for(config: &Config) -> anyhow::Result<Option<SmtpRelay>> {
    match config.email.as_ref() {
        Some(email) if email.enabled => SmtpRelay::new(email, config.ignore_ssl)
            .map(Some)
            .context("Failed to set up SMTP relay"),
        _ => Ok(None),
    }
}

/// Builds the message from `cli` and `input` and dispatches it exactly once
///
/// Fails without reading `input` or creating a transport if no recipient was
/// given. Delivery problems are only reported through the returned [`Delivery`].
pub fn deliver<R, T, M>(
    cli: &Cli,
    config: &Config,
    make_transport: M,
    input: R,
) -> anyhow::Result<(Ending, Delivery)>
where
    R: BufRead,
    T: Transport,
    M: FnOnce(&Config) -> anyhow::Result<Option<T>>,
{
    let mut message = cli.seed_message()?;
    let transport = make_transport(config)?;
    let mut delivery = None;
    let ending = reader::pump(input, &mut message, |message| {
        delivery = Some(dispatch(config, transport.as_ref(), message));
    });
    let delivery = delivery.context("Message was not dispatched")?;
    Ok((ending, delivery))
}
