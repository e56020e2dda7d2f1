//! These structs provide the CLI interface for the bills CLI.

use crate::error::{ErrorType, IntoResult};
use crate::filter::{DateRange, FilterUpdates};
use crate::model::BillStatus;
use crate::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// bills: Filter and total the bills recorded by a clinic's cashier module.
///
/// Bills are fetched from an OpenMRS billing server for a status and a range of days. They can
/// then be narrowed by payment method, cashier, service type and status, and totalled by payment
/// mode.
///
/// Set BILLS_IN_TEST_MODE to a non-empty value to work against built-in sample bills instead of a
/// server.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and the configuration file.
    ///
    /// This is the first command you should run. Pass the base URL of your billing server, e.g.
    /// https://emr.example.org/openmrs, and the username to log in with if the server requires
    /// one. The password is read from BILLS_PASSWORD when needed and is never stored.
    Init(InitArgs),
    /// Show the payment mode totals and a summary of the bills that pass the filters.
    Summary(FilterArgs),
    /// List the bills that pass the filters.
    List(FilterArgs),
    /// Show the cashiers, payment modes and service types found in the bills that pass the
    /// filters. Use these to narrow the filters further.
    Options(FilterArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the configuration is held. Defaults to ~/bills
    #[arg(long, env = "BILLS_HOME", default_value_t = default_bills_home())]
    bills_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, bills_home: PathBuf) -> Self {
        Self {
            log_level,
            bills_home: bills_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn bills_home(&self) -> &DisplayPath {
        &self.bills_home
    }
}

/// Args for the `bills init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of the billing server, e.g. https://emr.example.org/openmrs
    #[arg(long)]
    server_url: String,

    /// The username for HTTP basic auth.
    #[arg(long)]
    username: Option<String>,
}

impl InitArgs {
    pub fn new(server_url: impl Into<String>, username: Option<String>) -> Self {
        Self {
            server_url: server_url.into(),
            username,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

/// Args that select and narrow the bills for `summary`, `list` and `options`.
#[derive(Debug, Parser, Clone, Default)]
pub struct FilterArgs {
    /// The first day to fetch, e.g. 2025-03-01. Defaults to today.
    #[arg(long)]
    from: Option<NaiveDate>,

    /// The last day to fetch. Defaults to `--from`, or today.
    #[arg(long)]
    to: Option<NaiveDate>,

    /// The bill status to fetch from the server. Defaults to the configured status, or PAID.
    #[arg(long, value_enum)]
    query_status: Option<BillStatus>,

    /// Keep only bills with this status. Defaults to the status that was fetched.
    #[arg(long, value_enum)]
    status: Option<BillStatus>,

    /// Keep only payments made with this method, compared without regard to case. Bills left with
    /// no payments are dropped. Can be given more than once.
    #[arg(long = "payment-method")]
    payment_methods: Vec<String>,

    /// Keep only bills taken by this cashier id. Can be given more than once.
    #[arg(long = "cashier")]
    cashiers: Vec<String>,

    /// Keep only bills with a line item for this service type uuid. Can be given more than once.
    #[arg(long = "service-type")]
    service_types: Vec<String>,

    /// Count only bills whose first payment is through this payment mode when totalling. The name
    /// must match exactly. Can be given more than once.
    #[arg(long = "mode")]
    modes: Vec<String>,
}

impl FilterArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_day(mut self, day: NaiveDate) -> Self {
        self.from = Some(day);
        self
    }

    pub fn to_day(mut self, day: NaiveDate) -> Self {
        self.to = Some(day);
        self
    }

    pub fn query_status(mut self, status: BillStatus) -> Self {
        self.query_status = Some(status);
        self
    }

    pub fn status(mut self, status: BillStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_methods.push(method.into());
        self
    }

    pub fn cashier(mut self, cashier_id: impl Into<String>) -> Self {
        self.cashiers.push(cashier_id.into());
        self
    }

    pub fn service_type(mut self, uuid: impl Into<String>) -> Self {
        self.service_types.push(uuid.into());
        self
    }

    pub fn mode(mut self, name: impl Into<String>) -> Self {
        self.modes.push(name.into());
        self
    }

    /// The days to fetch. A missing end is the start day, a missing start is today.
    pub fn date_range(&self) -> Result<DateRange> {
        let from = self.from.unwrap_or_else(|| Local::now().date_naive());
        let to = self.to.unwrap_or(from);
        DateRange::for_days(from, to).pub_result(ErrorType::Request)
    }

    /// The status to fetch, falling back to `default`.
    pub fn fetch_status(&self, default: BillStatus) -> BillStatus {
        self.query_status.unwrap_or(default)
    }

    /// Filter updates for every non-date dimension. The status filter falls back to `fetched`.
    pub fn updates(&self, fetched: BillStatus) -> FilterUpdates {
        FilterUpdates {
            payment_methods: Some(to_set(&self.payment_methods)),
            cashiers: Some(to_set(&self.cashiers)),
            service_types: Some(to_set(&self.service_types)),
            status: Some(Some(self.status.unwrap_or(fetched))),
        }
    }

    pub fn modes(&self) -> &[String] {
        &self.modes
    }
}

fn to_set(values: &[String]) -> BTreeSet<String> {
    values.iter().cloned().collect()
}

fn default_bills_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("bills"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --bills-home or BILLS_HOME instead of relying on the default \
                bills home directory.",
            );
            PathBuf::from("bills")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
