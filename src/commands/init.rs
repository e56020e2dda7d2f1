use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the data directory and an initial `config.json` file.
///
/// # Arguments
/// - `bills_home` - The directory that will be the root of data directory, e.g. `$HOME/bills`
/// - `server_url` - The base URL of the billing server, e.g. `https://emr.example.org/openmrs`
/// - `username` - The user for HTTP basic auth. The password is read from `BILLS_PASSWORD`.
///
/// # Errors
/// - Returns an error if `server_url` is invalid or if any file operations fail.
pub async fn init(bills_home: &Path, server_url: &str, username: Option<&str>) -> Result<Out<()>> {
    let config = Config::create(bills_home, server_url, username).await?;
    Ok(format!(
        "Successfully created the bills config at {}",
        config.config_path().display()
    )
    .into())
}
