use crate::model::Amount;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The lifecycle state of a bill, as reported by the billing source.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    #[default]
    Pending,
    Posted,
    Paid,
    Exempted,
    Adjusted,
    Cancelled,
    Closed,
}

serde_plain::derive_display_from_serialize!(BillStatus);
serde_plain::derive_fromstr_from_deserialize!(BillStatus);

/// The user who created or settled a bill.
#[derive(Default, Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cashier {
    pub(crate) id: String,
    pub(crate) display_name: String,
}

impl Cashier {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// One tender recorded against a bill.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// The payment mode name, e.g. "Cash" or "Insurance".
    pub(crate) instance_type_name: String,
    pub(crate) amount_tendered: Amount,
}

impl Payment {
    pub fn new(instance_type_name: impl Into<String>, amount_tendered: impl Into<Amount>) -> Self {
        Self {
            instance_type_name: instance_type_name.into(),
            amount_tendered: amount_tendered.into(),
        }
    }

    pub fn instance_type_name(&self) -> &str {
        &self.instance_type_name
    }

    pub fn amount_tendered(&self) -> Amount {
        self.amount_tendered
    }
}

/// A billable line on a bill.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub(crate) service_type_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
}

impl LineItem {
    pub fn new(service_type_uuid: impl Into<String>) -> Self {
        Self {
            service_type_uuid: service_type_uuid.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn service_type_uuid(&self) -> &str {
        &self.service_type_uuid
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A single billing record. Transactions are supplied already validated by a `BillSource` and are
/// never modified by the filter engine; filtering produces new values.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub(crate) id: String,
    pub(crate) status: BillStatus,
    pub(crate) cashier: Cashier,
    #[serde(default)]
    pub(crate) payments: Vec<Payment>,
    #[serde(default)]
    pub(crate) line_items: Vec<LineItem>,
    pub(crate) date_created: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) receipt_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) patient_name: Option<String>,
}

impl Transaction {
    /// Creates a transaction with no payments and no line items.
    pub fn new(
        id: impl Into<String>,
        status: BillStatus,
        cashier: Cashier,
        date_created: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            status,
            cashier,
            date_created,
            ..Default::default()
        }
    }

    pub fn with_payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn with_line_item(mut self, line_item: LineItem) -> Self {
        self.line_items.push(line_item);
        self
    }

    pub fn with_receipt_number(mut self, receipt_number: impl Into<String>) -> Self {
        self.receipt_number = Some(receipt_number.into());
        self
    }

    pub fn with_patient_name(mut self, patient_name: impl Into<String>) -> Self {
        self.patient_name = Some(patient_name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> BillStatus {
        self.status
    }

    pub fn cashier(&self) -> &Cashier {
        &self.cashier
    }

    /// The distinct service types of the line items.
    pub fn service_type_refs(&self) -> BTreeSet<&str> {
        self.line_items
            .iter()
            .map(|item| item.service_type_uuid())
            .collect()
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn date_created(&self) -> NaiveDateTime {
        self.date_created
    }

    pub fn receipt_number(&self) -> Option<&str> {
        self.receipt_number.as_deref()
    }

    pub fn patient_name(&self) -> Option<&str> {
        self.patient_name.as_deref()
    }

    /// The sum of every payment's tendered amount.
    pub fn total_tendered(&self) -> Amount {
        self.payments.iter().map(|p| p.amount_tendered).sum()
    }
}
