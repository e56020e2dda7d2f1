use crate::error::Res;
use crate::model::BillStatus;
use anyhow::bail;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An inclusive range of local wall-clock times. `start` is never after `end`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Res<Self> {
        if start > end {
            bail!("Invalid date range: start {start} is after end {end}");
        }
        Ok(Self { start, end })
    }

    /// The whole of a single calendar day, from midnight to the last nanosecond.
    pub fn for_day(day: NaiveDate) -> Self {
        Self {
            start: day.and_time(NaiveTime::MIN),
            end: day.and_time(end_of_day()),
        }
    }

    /// Every day from `first` through `last`, both whole.
    pub fn for_days(first: NaiveDate, last: NaiveDate) -> Res<Self> {
        Self::new(first.and_time(NaiveTime::MIN), last.and_time(end_of_day()))
    }

    /// The current calendar day in local time.
    pub fn today() -> Self {
        Self::for_day(Local::now().date_naive())
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::today()
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

/// The active filter criteria.
///
/// A `FilterSpec` is a value: the `with_*` methods return a new spec and leave `self` untouched.
/// An empty set for any dimension means that dimension does not constrain the result.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    date_range: DateRange,
    payment_methods: BTreeSet<String>,
    cashiers: BTreeSet<String>,
    service_types: BTreeSet<String>,
    status: Option<BillStatus>,
}

impl FilterSpec {
    /// A spec with the given date range and no other constraints.
    pub fn new(date_range: DateRange) -> Self {
        Self {
            date_range,
            ..Default::default()
        }
    }

    pub fn with_date_range(&self, date_range: DateRange) -> Self {
        Self {
            date_range,
            ..self.clone()
        }
    }

    pub fn with_payment_methods<I, S>(&self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            payment_methods: methods.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    pub fn with_cashiers<I, S>(&self, cashier_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cashiers: cashier_ids.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    pub fn with_service_types<I, S>(&self, service_type_uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service_types: service_type_uuids.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    pub fn with_status(&self, status: Option<BillStatus>) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Applies the dimensions that are set in `updates`, keeping the others.
    pub fn merge(&self, updates: FilterUpdates) -> Self {
        let mut next = self.clone();
        if let Some(x) = updates.payment_methods {
            next.payment_methods = x;
        }
        if let Some(x) = updates.cashiers {
            next.cashiers = x;
        }
        if let Some(x) = updates.service_types {
            next.service_types = x;
        }
        if let Some(x) = updates.status {
            next.status = x;
        }
        next
    }

    /// Keeps the date range and clears every other dimension.
    pub fn cleared(&self) -> Self {
        Self::new(self.date_range)
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn payment_methods(&self) -> &BTreeSet<String> {
        &self.payment_methods
    }

    pub fn cashiers(&self) -> &BTreeSet<String> {
        &self.cashiers
    }

    pub fn service_types(&self) -> &BTreeSet<String> {
        &self.service_types
    }

    pub fn status(&self) -> Option<BillStatus> {
        self.status
    }

    /// True when no dimension other than the date range is constrained.
    pub fn is_pass_through(&self) -> bool {
        self.payment_methods.is_empty()
            && self.cashiers.is_empty()
            && self.service_types.is_empty()
            && self.status.is_none()
    }
}

/// The non-date dimensions to change on a `FilterSpec`. Only the fields that are `Some` are
/// replaced; the rest keep their current values.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FilterUpdates {
    pub payment_methods: Option<BTreeSet<String>>,
    pub cashiers: Option<BTreeSet<String>>,
    pub service_types: Option<BTreeSet<String>>,
    /// `Some(None)` removes the status constraint.
    pub status: Option<Option<BillStatus>>,
}
