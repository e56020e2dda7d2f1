use crate::api::{BillSource, Mode};
use crate::args::FilterArgs;
use crate::commands::{filtered_context, plural, source, Out};
use crate::filter::{summarize, BillSummary, DateRange, PaymentModeTotal};
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Payment mode totals and headline numbers for the bills that pass the filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub date_range: DateRange,
    pub summary: BillSummary,
    pub totals: Vec<PaymentModeTotal>,
}

/// Fetches the bills for `args`, filters them and totals them by payment mode.
///
/// # Errors
/// - Returns an error if the date range is invalid.
/// - Returns an error if the bills or the payment modes cannot be fetched.
pub async fn summary(config: Config, mode: Mode, args: FilterArgs) -> Result<Out<SummaryReport>> {
    let source = source(&config, mode)?;
    summary_from(config, source, args).await
}

pub(crate) async fn summary_from(
    config: Config,
    source: Arc<dyn BillSource>,
    args: FilterArgs,
) -> Result<Out<SummaryReport>> {
    let context = filtered_context(&config, source, &args, true).await?;
    let snapshot = context.snapshot().await;
    let summary = summarize(&snapshot.filtered);
    let message = format!(
        "{} with {} totalling {}",
        plural(summary.bill_count, "bill"),
        plural(summary.payment_count, "payment"),
        summary.total
    );
    Ok(Out::new(
        message,
        SummaryReport {
            date_range: snapshot.spec.date_range(),
            summary,
            totals: snapshot.totals,
        },
    ))
}
