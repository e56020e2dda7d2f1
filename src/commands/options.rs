use crate::api::{BillSource, Mode};
use crate::args::FilterArgs;
use crate::commands::{filtered_context, plural, source, Out};
use crate::filter::{distinct_cashiers, distinct_payment_mode_names, distinct_service_types};
use crate::model::Cashier;
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The values that can be chosen for each filter, taken from the bills that already pass the
/// filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub cashiers: Vec<Cashier>,
    pub payment_modes: Vec<String>,
    pub service_types: Vec<String>,
}

/// Fetches the bills for `args` and lists the distinct cashiers, payment modes and service types
/// among those that pass the filters.
pub async fn options(config: Config, mode: Mode, args: FilterArgs) -> Result<Out<FilterOptions>> {
    let source = source(&config, mode)?;
    options_from(config, source, args).await
}

pub(crate) async fn options_from(
    config: Config,
    source: Arc<dyn BillSource>,
    args: FilterArgs,
) -> Result<Out<FilterOptions>> {
    let context = filtered_context(&config, source, &args, false).await?;
    let filtered = context.snapshot().await.filtered;
    let options = FilterOptions {
        cashiers: distinct_cashiers(&filtered),
        payment_modes: distinct_payment_mode_names(&filtered),
        service_types: distinct_service_types(&filtered),
    };
    let message = format!(
        "{}, {} and {}",
        plural(options.cashiers.len(), "cashier"),
        plural(options.payment_modes.len(), "payment mode"),
        plural(options.service_types.len(), "service type")
    );
    Ok(Out::new(message, options))
}
