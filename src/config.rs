//! Configuration file handling for the bills CLI.
//!
//! The configuration file is stored at `$BILLS_HOME/config.json` and holds the billing server URL,
//! the username used for basic auth and the bill status queried by default. The password is never
//! stored; it is read from `BILLS_PASSWORD` when a request is made.

use crate::error::{ErrorType, IntoResult, Res};
use crate::model::BillStatus;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "bills";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$BILLS_HOME` and from there it loads `$BILLS_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    server_url: Url,
}

impl Config {
    /// Creates the data directory and an initial `config.json` file.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/bills`
    /// - `server_url` - The base URL of the billing server, e.g. `https://emr.example.org/openmrs`
    /// - `username` - The user for HTTP basic auth, if the server requires it.
    ///
    /// # Errors
    /// - Returns an error if `server_url` is not a URL or if any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        server_url: &str,
        username: Option<&str>,
    ) -> Result<Self> {
        Self::create_inner(dir.into(), server_url, username)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(
        maybe_relative: PathBuf,
        server_url: &str,
        username: Option<&str>,
    ) -> Res<Self> {
        let server = parse_server_url(server_url)?;

        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the bills home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;
        let config_path = root.join(CONFIG_JSON);

        let config_file = ConfigFile {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            server_url: server_url.to_string(),
            username: username.map(String::from),
            default_status: None,
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            config_path,
            config_file,
            server_url: server,
        })
    }

    /// This will
    /// - validate that `bills_home` exists and that the config file exists
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(bills_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(bills_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Bills home is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let server_url = parse_server_url(&config_file.server_url)?;

        Ok(Self {
            root,
            config_path,
            config_file,
            server_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_str()
    }

    pub fn username(&self) -> Option<&str> {
        self.config_file.username.as_deref()
    }

    /// The bill status to fetch when none is given on the command line. Defaults to `PAID`.
    pub fn default_status(&self) -> BillStatus {
        self.config_file.default_status.unwrap_or(BillStatus::Paid)
    }
}

fn parse_server_url(s: &str) -> Res<Url> {
    let url = Url::parse(s).with_context(|| format!("Invalid server URL '{s}'"))?;
    if url.cannot_be_a_base() {
        bail!("The server URL '{s}' cannot be used as a base URL");
    }
    Ok(url)
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "bills",
///   "config_version": 1,
///   "server_url": "https://emr.example.org/openmrs",
///   "username": "admin",
///   "default_status": "PAID"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "bills"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the billing server
    server_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_status: Option<BillStatus>,
}

impl ConfigFile {
    /// Loads a ConfigFile from `path` and checks its `app_name`.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let config: ConfigFile = utils::deserialize(path.as_ref()).await?;
        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }
}
