use crate::api::{BillSource, Mode};
use crate::args::FilterArgs;
use crate::commands::{filtered_context, plural, source, Out};
use crate::model::Transaction;
use crate::{Config, Result};
use std::sync::Arc;

/// Fetches the bills for `args` and returns the ones that pass the filters. When a payment method
/// filter is set, each bill only carries its matching payments.
pub async fn list(config: Config, mode: Mode, args: FilterArgs) -> Result<Out<Vec<Transaction>>> {
    let source = source(&config, mode)?;
    list_from(config, source, args).await
}

pub(crate) async fn list_from(
    config: Config,
    source: Arc<dyn BillSource>,
    args: FilterArgs,
) -> Result<Out<Vec<Transaction>>> {
    let context = filtered_context(&config, source, &args, false).await?;
    let snapshot = context.snapshot().await;
    let message = format!(
        "{} of {} fetched pass the filters",
        plural(snapshot.filtered.len(), "bill"),
        snapshot.transactions.len()
    );
    Ok(Out::new(message, snapshot.filtered))
}
