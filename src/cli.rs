use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use log::{error, info};

use crate::{
    config::{Config, CONFIG_FILENAME},
    message::MessageRecord,
};

#[derive(Parser, Clone, Eq, PartialEq, Debug, Default)]
#[command(
    author,
    version,
    about,
    long_about = "Reads a message from stdin until a line containing only EOT (or end of input) and sends it by email."
)]
pub struct Cli {
    /// Enables debugging messages and disables the actual delivery of messages
    #[arg(long, short)]
    pub debug: bool,

    /// Verbose mode. The details of delivery are displayed on the user's terminal
    #[arg(long, short)]
    pub verbose: bool,

    /// Specify subject on command line
    ///
    /// Only the first argument after the flag is used as a subject, quote subjects containing spaces
    #[arg(long, short, value_name = "SUBJECT", allow_hyphen_values = true)]
    pub subject: Option<String>,

    /// Sets the From address. Accepted for compatibility only, the from address in the config is used
    #[arg(long, short = 'r', value_name = "FROM_ADDR", allow_hyphen_values = true)]
    pub from: Option<String>,

    /// Attach the given file to the message (not supported yet)
    #[arg(long, short, value_name = "FILE_LOCATION", allow_hyphen_values = true)]
    pub attach: Option<PathBuf>,

    /// Send blind carbon copies to a comma separated list of addresses
    #[arg(long, short, value_name = "LIST", allow_hyphen_values = true)]
    pub bcc: Option<String>,

    /// Send carbon copies to a comma separated list of addresses
    #[arg(long, short, value_name = "LIST", allow_hyphen_values = true)]
    pub cc: Option<String>,

    /// Specify config file to use
    ///
    /// If not specified uses `config.json` in the current directory
    #[arg(long = "config", value_name = "PATH")]
    pub config_filename: Option<PathBuf>,

    /// Address to send the message to. Only the first one is used
    #[arg(value_name = "TO")]
    pub recipients: Vec<String>,
}

impl Cli {
    pub fn get_config_path(&self) -> PathBuf {
        match self.config_filename.as_ref() {
            Some(val) => val.clone(),
            None => PathBuf::from(CONFIG_FILENAME),
        }
    }

    /// Applies the options that change configuration
    pub fn apply_to(&self, config: &mut Config) {
        if self.debug {
            if let Some(email) = config.email.as_mut() {
                email.enabled = false;
            }
            config.extended_logging = true;
        }
        if self.verbose {
            config.extended_logging = true;
        }
    }

    /// Logs diagnostics about the options themselves. Expected to run once logging is set up
    pub fn report(&self) {
        if self.debug {
            info!("{self:?}");
        }
        if self.from.is_some() {
            info!("From override ignored, using the from address in the config");
        }
        if self.attach.is_some() {
            error!("Attachment handling not yet defined.");
        }
    }

    /// Creates the message from the options, fails if no recipient was given
    pub fn seed_message(&self) -> anyhow::Result<MessageRecord> {
        info!("Remaining arguments: {}", self.recipients.len());
        let Some(to) = self.recipients.first().filter(|to| !to.is_empty()) else {
            bail!("This version of the program requires 1 parameter defining the to-address");
        };
        let mut message = MessageRecord::new(to.clone());
        info!("TO set to be: {to}");

        if let Some(subject) = &self.subject {
            message.subject = Some(subject.clone());
            info!("Subject set to be: {subject}");
        }
        if let Some(cc) = &self.cc {
            message.cc = Some(cc.clone());
            info!("CC set to be: {cc}");
        }
        if let Some(bcc) = &self.bcc {
            message.bcc = Some(bcc.clone());
            info!("BCC set to be: {bcc}");
        }
        Ok(message)
    }
}
