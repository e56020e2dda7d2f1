//! Implements the `BillSource` trait using in-memory data.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without a billing server.

use crate::api::BillSource;
use crate::error::Res;
use crate::filter::DateRange;
use crate::model::{
    Amount, BillStatus, Cashier, LineItem, Payment, PaymentMode, Transaction,
};
use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::io::Cursor;
use std::str::FromStr;
use tracing::trace;

/// A `BillSource` that answers queries from bills held in memory. By default, it is seeded with
/// a week of bills whose most recent day is today.
#[derive(Debug, Clone)]
pub struct MemorySource {
    bills: Vec<Transaction>,
    modes: Vec<PaymentMode>,
}

impl MemorySource {
    pub fn new(bills: Vec<Transaction>, modes: Vec<PaymentMode>) -> Self {
        Self { bills, modes }
    }

    /// Loads the seed data from this module, shifted so that its most recent day is `anchor`.
    pub fn seed(anchor: NaiveDate) -> Res<Self> {
        let bills = load_bills(BILL_DATA)?;
        let shift = anchor - seed_anchor()?;
        let bills = bills
            .into_iter()
            .map(|mut bill| {
                bill.date_created += shift;
                bill
            })
            .collect();
        Ok(Self::new(bills, load_modes(PAYMENT_MODE_DATA)?))
    }

    pub fn bills(&self) -> &[Transaction] {
        &self.bills
    }
}

impl Default for MemorySource {
    /// Loads the seed data, anchored on today.
    fn default() -> Self {
        // Seed data is static; an empty source is the fallback.
        Self::seed(Local::now().date_naive()).unwrap_or_else(|_| Self::new(Vec::new(), Vec::new()))
    }
}

#[async_trait::async_trait]
impl BillSource for MemorySource {
    async fn fetch_transactions(
        &self,
        status: BillStatus,
        range: DateRange,
    ) -> Res<Vec<Transaction>> {
        trace!("fetch_transactions {status} {} to {}", range.start(), range.end());
        Ok(self
            .bills
            .iter()
            .filter(|bill| bill.status() == status && range.contains(bill.date_created()))
            .cloned()
            .collect())
    }

    async fn fetch_payment_modes(&self) -> Res<Vec<PaymentMode>> {
        Ok(self.modes.clone())
    }
}

/// One row of the seed bill data.
#[derive(Debug, Deserialize)]
struct BillRow {
    id: String,
    date_created: NaiveDateTime,
    status: String,
    cashier_id: String,
    cashier_name: String,
    receipt_number: String,
    patient_name: String,
    /// Semicolon-separated service type uuids.
    service_types: String,
    /// Semicolon-separated `mode:amount` pairs.
    payments: String,
}

impl BillRow {
    fn into_transaction(self) -> Res<Transaction> {
        let status = BillStatus::from_str(&self.status)
            .with_context(|| format!("Invalid status '{}' for bill {}", self.status, self.id))?;
        let mut bill = Transaction::new(
            &self.id,
            status,
            Cashier::new(self.cashier_id, self.cashier_name),
            self.date_created,
        )
        .with_receipt_number(self.receipt_number)
        .with_patient_name(self.patient_name);

        for service_type in split_list(&self.service_types) {
            bill = bill.with_line_item(LineItem::new(service_type));
        }
        for pair in split_list(&self.payments) {
            let (mode, amount) = pair
                .split_once(':')
                .with_context(|| format!("Invalid payment '{pair}' for bill {}", self.id))?;
            let amount = Amount::from_str(amount)
                .with_context(|| format!("Invalid amount in '{pair}' for bill {}", self.id))?;
            bill = bill.with_payment(Payment::new(mode, amount));
        }
        Ok(bill)
    }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(';').map(str::trim).filter(|part| !part.is_empty())
}

/// Loads bills from a CSV-formatted string.
fn load_bills(csv_data: &str) -> Res<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));
    let mut bills = Vec::new();
    for result in rdr.deserialize::<BillRow>() {
        let row = result.context("Unable to parse seed bill row")?;
        bills.push(row.into_transaction()?);
    }
    Ok(bills)
}

/// Loads payment modes from a CSV-formatted string.
fn load_modes(csv_data: &str) -> Res<Vec<PaymentMode>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));
    let mut modes = Vec::new();
    for result in rdr.records() {
        let record = result.context("Unable to parse seed payment mode row")?;
        let id = record.get(0).context("Payment mode row has no id")?;
        let name = record.get(1).context("Payment mode row has no name")?;
        let mut mode = PaymentMode::new(id, name);
        mode.description = record
            .get(2)
            .filter(|d| !d.is_empty())
            .map(String::from);
        modes.push(mode);
    }
    Ok(modes)
}

/// The most recent day in the seed bill data.
fn seed_anchor() -> Res<NaiveDate> {
    NaiveDate::from_str(SEED_ANCHOR).context("Invalid seed anchor date")
}

const SEED_ANCHOR: &str = "2025-10-20";

/// Seed bill data.
const BILL_DATA: &str = r##"id,date_created,status,cashier_id,cashier_name,receipt_number,patient_name,service_types,payments
b7f3c1e0-0001,2025-10-20T08:15:00,PAID,c-wanjiru,Jane Wanjiru,0001-20,Peter Otieno,svc-consultation,Cash:500
b7f3c1e0-0002,2025-10-20T09:40:00,PAID,c-wanjiru,Jane Wanjiru,0002-20,Mary Achieng,svc-laboratory;svc-consultation,Insurance:1200;Cash:300
b7f3c1e0-0003,2025-10-20T11:05:00,PAID,c-kamau,John Kamau,0003-20,Ali Hassan,svc-pharmacy,Mpesa:850
b7f3c1e0-0004,2025-10-20T13:30:00,PENDING,c-kamau,John Kamau,0004-20,Grace Njeri,svc-radiology,
b7f3c1e0-0005,2025-10-20T15:10:00,EXEMPTED,c-wanjiru,Jane Wanjiru,0005-20,Samuel Kiptoo,svc-consultation,Waiver:500
b7f3c1e0-0006,2025-10-19T10:00:00,PAID,c-kamau,John Kamau,0006-19,Lucy Chebet,svc-laboratory,Cash:450;Mpesa:150
b7f3c1e0-0007,2025-10-19T16:45:00,CLOSED,c-odhiambo,Brian Odhiambo,0007-19,David Mwangi,svc-radiology;svc-consultation,Insurance:3200
b7f3c1e0-0008,2025-10-18T09:20:00,PAID,c-odhiambo,Brian Odhiambo,0008-18,Faith Wambui,svc-pharmacy,Mpesa:620
b7f3c1e0-0009,2025-10-17T12:00:00,PAID,c-wanjiru,Jane Wanjiru,0009-17,James Mutua,svc-consultation,Cash:500
b7f3c1e0-0010,2025-10-16T14:25:00,PAID,c-kamau,John Kamau,0010-16,Esther Atieno,svc-laboratory;svc-pharmacy,Insurance:900;Mpesa:100
b7f3c1e0-0011,2025-10-15T08:55:00,PENDING,c-odhiambo,Brian Odhiambo,0011-15,Joseph Kariuki,svc-consultation,
b7f3c1e0-0012,2025-10-14T17:05:00,PAID,c-odhiambo,Brian Odhiambo,0012-14,Ruth Nyambura,svc-radiology,Cash:2500
"##;

/// Seed payment mode data.
const PAYMENT_MODE_DATA: &str = r##"uuid,name,description
pm-cash,Cash,Cash at the cashier's desk
pm-mpesa,Mpesa,Mobile money
pm-insurance,Insurance,Insurance claim
pm-waiver,Waiver,
"##;
