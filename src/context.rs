//! The stateful holder of the active filters, the raw bills and everything derived from them.
//!
//! Mutators that change what is fetched (`set_date_range`, `set_query_status`, `refresh`) go back
//! to the `BillSource`. Everything else recomputes against the bills already held. Fetches are
//! last-write-wins: each is tagged with a request id and a response that is not for the latest
//! request is dropped.

use crate::api::BillSource;
use crate::error::{ErrorType, IntoResult};
use crate::filter::{
    aggregate_by_payment_mode, apply_filters, DateRange, FilterSpec, FilterUpdates,
    PaymentModeTotal,
};
use crate::model::{BillStatus, PaymentMode, Transaction};
use crate::{Error, Result};
use anyhow::Context;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// How a fetch ended.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The response was applied and derived state recomputed.
    Applied,
    /// A later request was issued before this one returned, so its response was dropped.
    Superseded,
    /// The fetch failed. Derived state is unchanged and the error is also held in the state.
    Failed(Arc<Error>),
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, FetchOutcome::Applied)
    }

    /// `Err` when the fetch failed, for callers that cannot carry on without the data.
    pub fn into_result(self) -> Result<()> {
        match self {
            FetchOutcome::Applied | FetchOutcome::Superseded => Ok(()),
            FetchOutcome::Failed(e) => Err(e.detached()),
        }
    }
}

/// A copy of the context state at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub spec: FilterSpec,
    /// The status sent to the source when fetching.
    pub query_status: BillStatus,
    /// The bills as last fetched.
    pub transactions: Vec<Transaction>,
    pub filtered: Vec<Transaction>,
    pub totals: Vec<PaymentModeTotal>,
    pub payment_modes: Vec<PaymentMode>,
    pub mode_filter: BTreeSet<String>,
    /// The most recent fetch error. It is cleared when the same kind of fetch next succeeds.
    pub error: Option<Arc<Error>>,
    /// True while the latest fetch is outstanding.
    pub loading: bool,
}

#[derive(Debug)]
struct State {
    spec: FilterSpec,
    query_status: BillStatus,
    raw: Vec<Transaction>,
    filtered: Vec<Transaction>,
    totals: Vec<PaymentModeTotal>,
    known_modes: Vec<PaymentMode>,
    mode_filter: BTreeSet<String>,
    error: Option<HeldError>,
    loading: bool,
    latest_request: u64,
}

/// Which fetch failed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum FetchKind {
    Bills,
    PaymentModes,
}

#[derive(Debug)]
struct HeldError {
    kind: FetchKind,
    error: Arc<Error>,
}

impl State {
    fn recompute(&mut self) {
        self.filtered = apply_filters(&self.raw, &self.spec);
        self.totals =
            aggregate_by_payment_mode(&self.filtered, &self.known_modes, &self.mode_filter);
        debug!(
            "Recomputed: {} of {} bills pass the filters, {} payment mode totals",
            self.filtered.len(),
            self.raw.len(),
            self.totals.len()
        );
    }

    fn set_error(&mut self, kind: FetchKind, error: Arc<Error>) {
        self.error = Some(HeldError { kind, error });
    }

    fn clear_error(&mut self, kind: FetchKind) {
        if self.error.as_ref().is_some_and(|held| held.kind == kind) {
            self.error = None;
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            spec: self.spec.clone(),
            query_status: self.query_status,
            transactions: self.raw.clone(),
            filtered: self.filtered.clone(),
            totals: self.totals.clone(),
            payment_modes: self.known_modes.clone(),
            mode_filter: self.mode_filter.clone(),
            error: self.error.as_ref().map(|held| held.error.clone()),
            loading: self.loading,
        }
    }
}

/// Holds the filter state for one view of the bills. It can be shared behind an `Arc`; the lock
/// on its state is never held while waiting on the `BillSource`.
pub struct FilterContext {
    source: Arc<dyn BillSource>,
    state: Mutex<State>,
}

impl FilterContext {
    /// Creates a context for `range` that has not fetched anything yet. Bills are fetched with
    /// status `PAID` and the filter also requires `PAID` until told otherwise.
    pub fn new(source: Arc<dyn BillSource>, range: DateRange) -> Self {
        let state = State {
            spec: FilterSpec::new(range).with_status(Some(BillStatus::Paid)),
            query_status: BillStatus::Paid,
            raw: Vec::new(),
            filtered: Vec::new(),
            totals: Vec::new(),
            known_modes: Vec::new(),
            mode_filter: BTreeSet::new(),
            error: None,
            loading: false,
            latest_request: 0,
        };
        Self {
            source,
            state: Mutex::new(state),
        }
    }

    /// Replaces the date range and fetches bills for it.
    pub async fn set_date_range(&self, range: DateRange) -> FetchOutcome {
        self.fetch(move |state| state.spec = state.spec.with_date_range(range))
            .await
    }

    /// Changes the status sent to the source and fetches again.
    pub async fn set_query_status(&self, status: BillStatus) -> FetchOutcome {
        self.fetch(move |state| state.query_status = status).await
    }

    /// Fetches the current date range and query status again.
    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch(|_| {}).await
    }

    /// Replaces the dimensions that are set in `updates` and recomputes against the bills already
    /// held.
    pub async fn set_filters(&self, updates: FilterUpdates) {
        let mut state = self.state.lock().await;
        trace!("set_filters {updates:?}");
        state.spec = state.spec.merge(updates);
        state.recompute();
    }

    /// Clears every dimension except the date range, including the status and the mode filter.
    pub async fn reset_filters(&self) {
        let mut state = self.state.lock().await;
        state.spec = state.spec.cleared();
        state.mode_filter.clear();
        state.recompute();
    }

    /// Restricts the payment mode totals to bills whose first payment is through one of `names`.
    /// An empty set removes the restriction.
    pub async fn set_mode_filter<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock().await;
        state.mode_filter = names.into_iter().map(Into::into).collect();
        state.recompute();
    }

    /// Fetches the known payment modes and recomputes the totals. On failure the previous modes
    /// are kept.
    pub async fn load_payment_modes(&self) -> FetchOutcome {
        let result = self
            .source
            .fetch_payment_modes()
            .await
            .context("Unable to fetch payment modes")
            .pub_result(ErrorType::Fetch);

        let mut state = self.state.lock().await;
        match result {
            Ok(modes) => {
                debug!("Loaded {} payment modes", modes.len());
                state.known_modes = modes;
                state.clear_error(FetchKind::PaymentModes);
                state.recompute();
                FetchOutcome::Applied
            }
            Err(e) => {
                warn!("{e}");
                let e = Arc::new(e);
                state.set_error(FetchKind::PaymentModes, e.clone());
                FetchOutcome::Failed(e)
            }
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.snapshot()
    }

    /// Applies `update` to the state, issues a new request and, if it is still the latest when the
    /// response arrives, applies the response.
    async fn fetch<F>(&self, update: F) -> FetchOutcome
    where
        F: FnOnce(&mut State),
    {
        let (request_id, status, range) = {
            let mut state = self.state.lock().await;
            update(&mut state);
            state.latest_request += 1;
            state.loading = true;
            (
                state.latest_request,
                state.query_status,
                state.spec.date_range(),
            )
        };
        debug!(
            "Request {request_id}: fetching {status} bills from {} to {}",
            range.start(),
            range.end()
        );

        let result = self
            .source
            .fetch_transactions(status, range)
            .await
            .context("Unable to fetch bills")
            .pub_result(ErrorType::Fetch);

        let mut state = self.state.lock().await;
        if request_id != state.latest_request {
            debug!(
                "Request {request_id}: dropping response, request {} is newer",
                state.latest_request
            );
            return FetchOutcome::Superseded;
        }
        state.loading = false;
        match result {
            Ok(bills) => {
                debug!("Request {request_id}: received {} bills", bills.len());
                state.raw = bills;
                state.clear_error(FetchKind::Bills);
                state.recompute();
                FetchOutcome::Applied
            }
            Err(e) => {
                warn!("Request {request_id}: {e}");
                let e = Arc::new(e);
                state.set_error(FetchKind::Bills, e.clone());
                FetchOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{bill, modes, sample_bills, test_day, ScriptedSource};
    use chrono::Days;
    use std::sync::atomic::Ordering;

    fn today() -> DateRange {
        DateRange::for_day(test_day())
    }

    fn tomorrow() -> DateRange {
        DateRange::for_day(test_day() + Days::new(1))
    }

    fn ids(bills: &[Transaction]) -> Vec<&str> {
        bills.iter().map(|b| b.id()).collect()
    }

    fn context(source: ScriptedSource) -> (Arc<ScriptedSource>, FilterContext) {
        let source = Arc::new(source);
        let context = FilterContext::new(source.clone(), today());
        (source, context)
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (_, context) = context(ScriptedSource::default());
        let snapshot = context.snapshot().await;
        assert_eq!(snapshot.spec.date_range(), today());
        assert_eq!(snapshot.spec.status(), Some(BillStatus::Paid));
        assert_eq!(snapshot.query_status, BillStatus::Paid);
        assert!(snapshot.spec.cashiers().is_empty());
        assert!(snapshot.filtered.is_empty());
        assert!(snapshot.totals.is_empty());
        assert!(snapshot.error.is_none());
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn test_fetch_applies_status_filter() {
        let source = ScriptedSource::new(modes(&["Cash", "Insurance", "Mpesa"]))
            .respond(today(), sample_bills());
        let (_, context) = context(source);
        assert!(context.load_payment_modes().await.is_applied());
        assert!(context.set_date_range(today()).await.is_applied());

        let snapshot = context.snapshot().await;
        assert_eq!(ids(&snapshot.transactions), vec!["b1", "b2", "b4"]);
        assert_eq!(ids(&snapshot.filtered), vec!["b1", "b2", "b4"]);
        let cash = snapshot
            .totals
            .iter()
            .find(|t| t.payment_mode_name == "Cash")
            .unwrap();
        assert_eq!(cash.total.value(), 550.5);
    }

    #[tokio::test]
    async fn test_query_status_refetches() {
        let source = ScriptedSource::default().respond(today(), sample_bills());
        let (source, context) = context(source);
        context.set_date_range(today()).await;
        context.set_query_status(BillStatus::Closed).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

        let snapshot = context.snapshot().await;
        assert_eq!(snapshot.query_status, BillStatus::Closed);
        assert_eq!(ids(&snapshot.transactions), vec!["b3"]);
        // The in-memory status filter still asks for PAID.
        assert!(snapshot.filtered.is_empty());

        context
            .set_filters(FilterUpdates {
                status: Some(Some(BillStatus::Closed)),
                ..Default::default()
            })
            .await;
        assert_eq!(ids(&context.snapshot().await.filtered), vec!["b3"]);
    }

    #[tokio::test]
    async fn test_set_filters_does_not_refetch() {
        let source = ScriptedSource::default().respond(today(), sample_bills());
        let (source, context) = context(source);
        context.set_date_range(today()).await;
        context
            .set_filters(FilterUpdates {
                cashiers: Some(BTreeSet::from(["B".to_string()])),
                ..Default::default()
            })
            .await;
        assert_eq!(ids(&context.snapshot().await.filtered), vec!["b2"]);

        // A partial update leaves the cashier filter in place.
        context
            .set_filters(FilterUpdates {
                payment_methods: Some(BTreeSet::from(["cash".to_string()])),
                ..Default::default()
            })
            .await;
        let snapshot = context.snapshot().await;
        assert_eq!(snapshot.spec.cashiers().len(), 1);
        assert_eq!(ids(&snapshot.filtered), vec!["b2"]);
        assert_eq!(snapshot.filtered[0].payments().len(), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_filters() {
        let source = ScriptedSource::new(modes(&["Cash"])).respond(today(), sample_bills());
        let (_, context) = context(source);
        context.load_payment_modes().await;
        context.set_date_range(today()).await;
        context
            .set_filters(FilterUpdates {
                service_types: Some(BTreeSet::from(["svc-lab".to_string()])),
                ..Default::default()
            })
            .await;
        context.set_mode_filter(["Cash"]).await;

        context.reset_filters().await;
        let snapshot = context.snapshot().await;
        assert!(snapshot.spec.is_pass_through());
        assert_eq!(snapshot.spec.date_range(), today());
        assert!(snapshot.mode_filter.is_empty());
        assert_eq!(snapshot.filtered.len(), 3);
    }

    #[tokio::test]
    async fn test_mode_filter_changes_totals_only() {
        let source =
            ScriptedSource::new(modes(&["Cash", "Insurance"])).respond(today(), sample_bills());
        let (_, context) = context(source);
        context.load_payment_modes().await;
        context.set_date_range(today()).await;
        context.set_mode_filter(["Insurance"]).await;

        let snapshot = context.snapshot().await;
        assert_eq!(snapshot.filtered.len(), 3);
        let totals: Vec<(String, f64)> = snapshot
            .totals
            .iter()
            .map(|t| (t.payment_mode_name.clone(), t.total.value()))
            .collect();
        assert_eq!(
            totals,
            vec![("Cash".to_string(), 50.0), ("Insurance".to_string(), 1200.0)]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_retains_totals_and_sets_error() {
        let source = ScriptedSource::new(modes(&["Cash", "Insurance", "Mpesa"]))
            .respond(today(), sample_bills());
        let (source, context) = context(source);
        context.load_payment_modes().await;
        context.set_date_range(today()).await;
        let before = context.snapshot().await;

        source.set_failing(true);
        let outcome = context.set_date_range(tomorrow()).await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Fetch);
        assert!(err.to_string().contains("Unable to fetch bills"));

        let after = context.snapshot().await;
        assert_eq!(after.totals, before.totals);
        assert_eq!(after.filtered, before.filtered);
        assert_eq!(after.spec.date_range(), tomorrow());
        assert!(!after.loading);
        let error = after.error.unwrap();
        assert_eq!(error.error_type(), ErrorType::Fetch);
        assert!(error.to_string().contains("503 Service Unavailable"));

        // Filters still apply to the stale bills.
        context
            .set_filters(FilterUpdates {
                cashiers: Some(BTreeSet::from(["A".to_string()])),
                ..Default::default()
            })
            .await;
        assert_eq!(ids(&context.snapshot().await.filtered), vec!["b1"]);

        source.set_failing(false);
        assert!(context.refresh().await.is_applied());
        let recovered = context.snapshot().await;
        assert!(recovered.error.is_none());
        assert!(recovered.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_payment_mode_failure_keeps_modes() {
        let source = ScriptedSource::new(modes(&["Cash"])).respond(today(), sample_bills());
        let (source, context) = context(source);
        context.load_payment_modes().await;
        source.set_failing(true);
        assert!(!context.load_payment_modes().await.is_applied());

        let snapshot = context.snapshot().await;
        assert_eq!(snapshot.payment_modes, modes(&["Cash"]));
        assert!(snapshot.error.is_some());
    }

    #[tokio::test]
    async fn test_payment_mode_retry_clears_error() {
        let source = ScriptedSource::new(modes(&["Cash"])).respond(today(), sample_bills());
        let (source, context) = context(source);
        source.set_failing(true);
        assert!(!context.load_payment_modes().await.is_applied());
        assert!(context.snapshot().await.error.is_some());

        source.set_failing(false);
        assert!(context.load_payment_modes().await.is_applied());
        let snapshot = context.snapshot().await;
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.payment_modes, modes(&["Cash"]));
    }

    #[tokio::test]
    async fn test_payment_mode_success_keeps_bill_error() {
        let source = ScriptedSource::new(modes(&["Cash"])).respond(today(), sample_bills());
        let (source, context) = context(source);
        source.set_failing(true);
        context.set_date_range(today()).await;
        source.set_failing(false);
        assert!(context.load_payment_modes().await.is_applied());
        assert!(context.snapshot().await.error.is_some());

        assert!(context.refresh().await.is_applied());
        assert!(context.snapshot().await.error.is_none());
    }

    #[tokio::test]
    async fn test_superseded_response_is_dropped() {
        let early = vec![bill("early", BillStatus::Paid, "A", &[("Cash", 1.0)])];
        let late = vec![bill("late", BillStatus::Paid, "B", &[("Cash", 2.0)])];
        let mut source = ScriptedSource::new(modes(&["Cash"]))
            .respond(today(), early)
            .respond(tomorrow(), late);
        let gate = source.gate(today());
        let source = Arc::new(source);
        let started = source.started.clone();
        let context = Arc::new(FilterContext::new(source.clone(), today()));
        context.load_payment_modes().await;

        let slow = {
            let context = context.clone();
            tokio::spawn(async move { context.set_date_range(today()).await })
        };
        started.notified().await;
        assert!(context.snapshot().await.loading);

        assert!(context.set_date_range(tomorrow()).await.is_applied());
        gate.notify_one();
        let outcome = slow.await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Superseded));

        let snapshot = context.snapshot().await;
        assert_eq!(snapshot.spec.date_range(), tomorrow());
        assert_eq!(ids(&snapshot.filtered), vec!["late"]);
        assert_eq!(snapshot.totals[0].total.value(), 2.0);
        assert!(!snapshot.loading);
    }
}
