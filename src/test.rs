//! Shared test utilities for building bills and test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::{BillSource, MemorySource};
use crate::args::FilterArgs;
use crate::filter::DateRange;
use crate::model::{BillStatus, Cashier, LineItem, Payment, PaymentMode, Transaction};
use crate::Config;
use anyhow::anyhow;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

/// The day every fixture bill is created on unless stated otherwise.
pub(crate) fn test_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
}

/// The built-in seed bills, anchored so that their last day is `test_day()`.
pub(crate) fn seeded_source() -> Arc<dyn BillSource> {
    Arc::new(MemorySource::seed(test_day()).unwrap())
}

/// Filter arguments for `test_day()` alone.
pub(crate) fn day_args() -> FilterArgs {
    FilterArgs::new().from_day(test_day())
}

pub(crate) fn at(day: NaiveDate, hour: u32) -> NaiveDateTime {
    day.and_hms_opt(hour, 0, 0).unwrap()
}

/// Creates a bill on `test_day()` for `cashier_id` with the given `(mode, amount)` payments.
pub(crate) fn bill(
    id: &str,
    status: BillStatus,
    cashier_id: &str,
    payments: &[(&str, f64)],
) -> Transaction {
    let cashier = Cashier::new(cashier_id, format!("Cashier {cashier_id}"));
    payments.iter().fold(
        Transaction::new(id, status, cashier, at(test_day(), 10)),
        |txn, (mode, amount)| txn.with_payment(Payment::new(*mode, *amount)),
    )
}

/// Adds a line item for each of `service_types` to `txn`.
pub(crate) fn with_services(txn: Transaction, service_types: &[&str]) -> Transaction {
    service_types
        .iter()
        .fold(txn, |txn, s| txn.with_line_item(LineItem::new(*s)))
}

pub(crate) fn modes(names: &[&str]) -> Vec<PaymentMode> {
    names
        .iter()
        .map(|n| PaymentMode::new(format!("mode-{}", n.to_lowercase()), *n))
        .collect()
}

/// A varied set of bills used by the property-style tests.
pub(crate) fn sample_bills() -> Vec<Transaction> {
    vec![
        with_services(
            bill("b1", BillStatus::Paid, "A", &[("Cash", 500.0)]),
            &["svc-consult"],
        ),
        with_services(
            bill("b2", BillStatus::Paid, "B", &[("Insurance", 1200.0), ("Cash", 50.0)]),
            &["svc-lab", "svc-consult"],
        ),
        with_services(
            bill("b3", BillStatus::Closed, "A", &[("Mpesa", 250.5)]),
            &["svc-pharmacy"],
        ),
        with_services(
            bill("b4", BillStatus::Paid, "C", &[("mpesa", 99.5), ("Cash", 0.5)]),
            &["svc-lab"],
        ),
        with_services(
            bill("b5", BillStatus::Exempted, "B", &[("Waiver", 300.0)]),
            &["svc-xray"],
        ),
    ]
}

/// Every subset of `bills`, each keeping the original order.
pub(crate) fn subsets(bills: &[Transaction]) -> Vec<Vec<Transaction>> {
    (0..1usize << bills.len())
        .map(|mask| {
            bills
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, b)| b.clone())
                .collect()
        })
        .collect()
}

/// Test environment that holds a temporary home directory with a created `Config`.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("bills");
        let config = Config::create(&root, "https://emr.example.org/openmrs", Some("admin"))
            .await
            .unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    pub fn config(&self) -> Config {
        self.config.clone()
    }
}

/// A `BillSource` whose responses are scripted per query start date. A response can be held back
/// behind a gate so that tests can control the order in which fetches complete.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    bills: HashMap<NaiveDateTime, Vec<Transaction>>,
    gated: HashMap<NaiveDateTime, Arc<Notify>>,
    modes: Vec<PaymentMode>,
    failing: AtomicBool,
    pub(crate) started: Arc<Notify>,
    pub(crate) fetches: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new(modes: Vec<PaymentMode>) -> Self {
        Self {
            modes,
            ..Default::default()
        }
    }

    pub(crate) fn respond(mut self, range: DateRange, bills: Vec<Transaction>) -> Self {
        self.bills.insert(range.start(), bills);
        self
    }

    /// Holds back the response for `range` until the returned `Notify` is notified.
    pub(crate) fn gate(&mut self, range: DateRange) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gated.insert(range.start(), notify.clone());
        notify
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl BillSource for ScriptedSource {
    async fn fetch_transactions(
        &self,
        status: BillStatus,
        range: DateRange,
    ) -> crate::error::Res<Vec<Transaction>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if let Some(gate) = self.gated.get(&range.start()) {
            gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("503 Service Unavailable"));
        }
        Ok(self
            .bills
            .get(&range.start())
            .map(|bills| {
                bills
                    .iter()
                    .filter(|b| b.status() == status)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_payment_modes(&self) -> crate::error::Res<Vec<PaymentMode>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("503 Service Unavailable"));
        }
        Ok(self.modes.clone())
    }
}
