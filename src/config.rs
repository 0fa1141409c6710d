use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use log::{debug, info};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Name of the file looked up both as the base config and inside a profile folder
pub const CONFIG_FILENAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Folder holding per profile configs. Used together with `name`
    pub config_folder: Option<PathBuf>,

    /// Profile to look for inside of `config_folder`
    pub name: Option<String>,

    /// If true the SMTP relay's certificate is not verified
    #[serde(default, rename = "ignoreSSL")]
    pub ignore_ssl: bool,

    /// Enables info level diagnostics
    #[serde(default)]
    pub extended_logging: bool,

    #[serde(default)]
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailConfig {
    /// If false nothing is sent and an error is logged instead
    #[serde(default)]
    pub enabled: bool,

    /// Only required when enabled
    #[serde(default)]
    pub host: String,

    #[serde(default = "EmailConfig::default_port")]
    pub port: u16,

    /// Use implicit TLS (usually port 465) instead of STARTTLS
    #[serde(default)]
    pub secure: bool,

    /// Sender used for every message. Only required when enabled
    #[serde(default)]
    pub from: String,

    pub auth: Option<Credentials>,
}

impl EmailConfig {
    fn default_port() -> u16 {
        587
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

/// Where the resolved config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Profile(PathBuf),
    BaseOnly { looked_in: Option<PathBuf> },
}

impl ConfigSource {
    /// Only visible when extended logging has raised the log level
    pub fn report(&self) {
        match self {
            ConfigSource::Profile(path) => info!("Using config from: {path:?}"),
            ConfigSource::BaseOnly {
                looked_in: Some(path),
            } => info!("Could not find config in path: {path:?}. Using default."),
            ConfigSource::BaseOnly { looked_in: None } => {
                info!("No profile configured (configFolder and name). Using default.")
            }
        }
    }
}

#[derive(Debug)]
pub struct Resolved {
    pub config: Config,
    pub source: ConfigSource,
}

impl Config {
    /// Loads the base config and overlays the profile config if one can be found
    pub fn resolve(base_path: &Path) -> anyhow::Result<Resolved> {
        let mut merged = read_object(base_path)?;

        let source = match profile_path(&merged) {
            Some(path) if path.is_file() => {
                let overlay = read_object(&path)?;
                debug!("Overlaying {} keys from {path:?}", overlay.len());
                merged.extend(overlay);
                ConfigSource::Profile(path)
            }
            looked_in => ConfigSource::BaseOnly { looked_in },
        };

        let config =
            serde_json::from_value(Value::Object(merged)).with_context(|| match &source {
                ConfigSource::Profile(path) => {
                    format!("Invalid config from {base_path:?} merged with {path:?}")
                }
                ConfigSource::BaseOnly { .. } => format!("Invalid config in {base_path:?}"),
            })?;
        Ok(Resolved { config, source })
    }

    pub fn email_enabled(&self) -> bool {
        self.email.as_ref().is_some_and(|email| email.enabled)
    }
}

/// `<configFolder>/<name>/config.json` if both keys are set
fn profile_path(map: &Map<String, Value>) -> Option<PathBuf> {
    let folder = map.get("configFolder")?.as_str()?;
    let name = map.get("name")?.as_str()?;
    Some(Path::new(folder).join(name).join(CONFIG_FILENAME))
}

fn read_object(path: &Path) -> anyhow::Result<Map<String, Value>> {
    debug!("Loading Config from: {path:?}");
    let file_contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read contents of {path:?}"))?;
    let value: Value = serde_json::from_str(&file_contents)
        .with_context(|| format!("Failed to parse contents of {path:?}"))?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("Expected a JSON object in {path:?} but found: {other}"),
    }
}
