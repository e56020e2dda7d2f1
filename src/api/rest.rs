//! Implements the `BillSource` trait against the OpenMRS cashier REST API.

use crate::api::BillSource;
use crate::error::Res;
use crate::filter::DateRange;
use crate::model::{Amount, BillStatus, Cashier, LineItem, Payment, PaymentMode, Transaction};
use crate::Config;
use anyhow::{bail, Context};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use tracing::trace;
use url::Url;

const BILL_PATH: &str = "ws/rest/v1/cashier/bill";
const PAYMENT_MODE_PATH: &str = "ws/rest/v1/cashier/paymentMode";
const QUERY_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const WIRE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// The environment variable holding the password used for HTTP basic auth.
pub const PASSWORD_ENV: &str = "BILLS_PASSWORD";

/// Fetches bills and payment modes over HTTP.
#[derive(Debug, Clone)]
pub struct RestSource {
    client: reqwest::Client,
    base: Url,
    username: Option<String>,
}

impl RestSource {
    pub fn new(config: &Config) -> Res<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base: base_url(config.server_url())?,
            username: config.username().map(String::from),
        })
    }

    fn bill_url(&self, status: BillStatus, range: DateRange) -> Res<Url> {
        let mut url = self
            .base
            .join(BILL_PATH)
            .context("Unable to build the bill URL")?;
        url.query_pairs_mut()
            .append_pair("status", &status.to_string())
            .append_pair(
                "createdOnOrAfter",
                &range.start().format(QUERY_DATE_FORMAT).to_string(),
            )
            .append_pair(
                "createdOnOrBefore",
                &range.end().format(QUERY_DATE_FORMAT).to_string(),
            )
            .append_pair("v", "full");
        Ok(url)
    }

    fn payment_mode_url(&self) -> Res<Url> {
        let mut url = self
            .base
            .join(PAYMENT_MODE_PATH)
            .context("Unable to build the payment mode URL")?;
        url.query_pairs_mut().append_pair("v", "full");
        Ok(url)
    }

    async fn get<T>(&self, url: Url) -> Res<T>
    where
        T: DeserializeOwned,
    {
        trace!("GET {url}");
        let mut request = self.client.get(url.clone());
        if let Some(username) = &self.username {
            request = request.basic_auth(username, std::env::var(PASSWORD_ENV).ok());
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Request to {url} failed with status {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Unable to parse the response from {url}"))
    }
}

#[async_trait::async_trait]
impl BillSource for RestSource {
    async fn fetch_transactions(
        &self,
        status: BillStatus,
        range: DateRange,
    ) -> Res<Vec<Transaction>> {
        let url = self.bill_url(status, range)?;
        let page: Results<WireBill> = self.get(url).await?;
        page.results
            .into_iter()
            .map(WireBill::into_transaction)
            .collect()
    }

    async fn fetch_payment_modes(&self) -> Res<Vec<PaymentMode>> {
        let url = self.payment_mode_url()?;
        let page: Results<WirePaymentMode> = self.get(url).await?;
        Ok(page.results.into_iter().map(PaymentMode::from).collect())
    }
}

/// `Url::join` replaces the last path segment unless the base ends with a slash.
fn base_url(server_url: &str) -> Res<Url> {
    let with_slash = if server_url.ends_with('/') {
        server_url.to_string()
    } else {
        format!("{server_url}/")
    };
    Url::parse(&with_slash).with_context(|| format!("Invalid server URL '{server_url}'"))
}

/// The envelope of every OpenMRS list response.
#[derive(Debug, Deserialize)]
struct Results<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBill {
    uuid: String,
    status: String,
    date_created: String,
    cashier: WireRef,
    #[serde(default)]
    patient: Option<WireRef>,
    #[serde(default)]
    receipt_number: Option<String>,
    #[serde(default)]
    payments: Vec<WirePayment>,
    #[serde(default)]
    line_items: Vec<WireLineItem>,
}

#[derive(Debug, Deserialize)]
struct WireRef {
    uuid: String,
    #[serde(default)]
    display: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePayment {
    instance_type: WireInstanceType,
    amount_tendered: Amount,
}

#[derive(Debug, Deserialize)]
struct WireInstanceType {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLineItem {
    /// Formatted as `uuid:name`.
    #[serde(default)]
    billable_service: Option<String>,
    #[serde(default)]
    item: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePaymentMode {
    uuid: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    retired: bool,
}

impl WireBill {
    fn into_transaction(self) -> Res<Transaction> {
        let status = BillStatus::from_str(&self.status)
            .with_context(|| format!("Unknown status '{}' on bill {}", self.status, self.uuid))?;
        let date_created = parse_wire_date(&self.date_created)
            .with_context(|| format!("Invalid dateCreated on bill {}", self.uuid))?;

        let mut bill = Transaction::new(
            &self.uuid,
            status,
            Cashier::new(self.cashier.uuid, self.cashier.display),
            date_created,
        );
        if let Some(receipt_number) = self.receipt_number {
            bill = bill.with_receipt_number(receipt_number);
        }
        if let Some(patient) = self.patient {
            bill = bill.with_patient_name(patient.display);
        }
        for item in self.line_items {
            if let Some(line_item) = item.into_line_item() {
                bill = bill.with_line_item(line_item);
            }
        }
        for payment in self.payments {
            bill = bill.with_payment(Payment::new(
                payment.instance_type.name,
                payment.amount_tendered,
            ));
        }
        Ok(bill)
    }
}

impl WireLineItem {
    /// The service type is the uuid part of `billableService`, or the `item` when the line is not
    /// a billable service. Lines with neither are skipped.
    fn into_line_item(self) -> Option<LineItem> {
        match (self.billable_service, self.item) {
            (Some(service), _) if !service.is_empty() => {
                let (uuid, name) = service.split_once(':').unwrap_or((service.as_str(), ""));
                let line_item = LineItem::new(uuid);
                Some(if name.is_empty() {
                    line_item
                } else {
                    line_item.with_description(name)
                })
            }
            (_, Some(item)) if !item.is_empty() => Some(LineItem::new(item)),
            _ => None,
        }
    }
}

impl From<WirePaymentMode> for PaymentMode {
    fn from(wire: WirePaymentMode) -> Self {
        PaymentMode {
            id: wire.uuid,
            name: wire.name,
            description: wire.description,
            retired: wire.retired,
        }
    }
}

/// Parses an OpenMRS timestamp such as `2025-03-04T09:30:00.000+0300` into local wall time.
fn parse_wire_date(s: &str) -> Res<NaiveDateTime> {
    let parsed = DateTime::parse_from_str(s, WIRE_DATE_FORMAT)
        .with_context(|| format!("Unable to parse '{s}' as a timestamp"))?;
    Ok(parsed.with_timezone(&Local).naive_local())
}
