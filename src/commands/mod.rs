//! Command handlers for the bills CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod init;
mod list;
mod options;
mod summary;

use crate::api::{self, BillSource, Mode};
use crate::args::FilterArgs;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, FilterContext, Result};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

pub use init::init;
pub use list::list;
pub use options::{options, FilterOptions};
pub use summary::{summary, SummaryReport};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to stdout.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            match serde_json::to_string_pretty(structure) {
                Ok(json) => println!("{json}"),
                Err(e) => debug!("Unable to serialize command output: {e}"),
            }
        }
    }
}

/// Creates the bill source for `mode`.
fn source(config: &Config, mode: Mode) -> Result<Arc<dyn BillSource>> {
    api::source(config, mode).pub_result(ErrorType::Config)
}

/// Builds a context over `source` for `args`, fetches the bills and applies the filters. Payment
/// modes are only loaded when `with_modes` is set.
async fn filtered_context(
    config: &Config,
    source: Arc<dyn BillSource>,
    args: &FilterArgs,
    with_modes: bool,
) -> Result<FilterContext> {
    let range = args.date_range()?;
    let context = FilterContext::new(source, range);

    let status = args.fetch_status(config.default_status());
    context.set_query_status(status).await.into_result()?;
    if with_modes {
        context.load_payment_modes().await.into_result()?;
    }
    context.set_filters(args.updates(status)).await;
    context.set_mode_filter(args.modes().iter().cloned()).await;
    Ok(context)
}

/// Adds an "s" when `count` is not one.
fn plural(count: usize, noun: &str) -> String {
    format!("{count} {noun}{}", if count == 1 { "" } else { "s" })
}
