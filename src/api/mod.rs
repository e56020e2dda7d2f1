//! The boundary to the billing system. A `BillSource` supplies raw bills for a status and date
//! range, and the list of known payment modes.

mod memory;
mod rest;

use crate::error::Res;
use crate::filter::DateRange;
use crate::model::{BillStatus, PaymentMode, Transaction};
use crate::Config;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use memory::MemorySource;
pub use rest::{RestSource, PASSWORD_ENV};

/// The environment variable that switches the app to the in-memory bill source.
pub const TEST_MODE_ENV: &str = "BILLS_IN_TEST_MODE";

/// Supplies bills and payment modes. Results are treated as already validated.
#[async_trait::async_trait]
pub trait BillSource: Send + Sync {
    /// Fetches every bill with `status` created within `range`.
    async fn fetch_transactions(
        &self,
        status: BillStatus,
        range: DateRange,
    ) -> Res<Vec<Transaction>>;

    /// Fetches the payment modes known to the billing system.
    async fn fetch_payment_modes(&self) -> Res<Vec<PaymentMode>>;
}

/// Whether we talk to a live billing server or to in-memory seed data.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Live,
    Testing,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// `Mode::Testing` when `BILLS_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Live`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Live,
        }
    }
}

/// Creates the `BillSource` for `mode`.
pub fn source(config: &Config, mode: Mode) -> Res<Arc<dyn BillSource>> {
    Ok(match mode {
        Mode::Live => Arc::new(RestSource::new(config)?),
        Mode::Testing => Arc::new(MemorySource::default()),
    })
}
