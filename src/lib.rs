//! Filtering and payment-mode totals for the bills recorded by a clinic's cashier module.
//!
//! Bills come from a `BillSource` (the OpenMRS REST API, or in-memory seed data). The pure engine
//! in `filter` narrows them and totals them; `FilterContext` holds the state for one view and
//! re-fetches when the date range or queried status changes.

pub mod api;
pub mod args;
pub mod commands;
mod config;
mod context;
mod error;
pub mod filter;
pub mod model;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::Config;
pub use context::{FetchOutcome, FilterContext, Snapshot};
pub use error::{Error, ErrorType, Result};
