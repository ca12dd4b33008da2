//! Timeframe filtering and spending aggregation.
//!
//! Everything here is pure: functions take the already-loaded expenses and an
//! explicit `now`, so results are reproducible in tests and identical for
//! parents and children.

use crate::errors::{Error, Result};
use crate::models::Expense;
use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const SECONDS_PER_DAY: i64 = 86_400;

/// `now` minus `days` whole days, saturating at the earliest representable instant.
pub(crate) fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now.checked_sub_signed(TimeDelta::days(days))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Window the analytics views are restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
    /// Last 12 months
    Year,
    /// Explicit inclusive range
    Custom {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl Timeframe {
    /// Builds a custom range, rejecting `from > to`.
    pub fn custom(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        if from > to {
            return Err(Error::validation(
                "timeframe",
                "start date must not be after end date",
            ));
        }
        Ok(Self::Custom { from, to })
    }

    /// Inclusive `[from, to]` bounds relative to `now`.
    #[must_use]
    pub fn bounds(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            Self::Week => (days_before(now, 7), now),
            Self::Month => (days_before(now, 30), now),
            Self::Year => (
                now.checked_sub_months(Months::new(12))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
                now,
            ),
            Self::Custom { from, to } => (from, to),
        }
    }

    /// Number of days used for the per-day average.
    #[must_use]
    pub fn day_span(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
            // Partial days count as whole days
            Self::Custom { from, to } => {
                let seconds = (to - from).num_seconds();
                let whole = seconds / SECONDS_PER_DAY;
                let partial = i64::from(seconds % SECONDS_PER_DAY > 0);
                (whole + partial).max(1)
            }
        }
    }

    /// Bucket label for an expense date.
    fn bucket_label(self, date: DateTime<Utc>) -> String {
        let format = match self {
            Self::Week => "%a",
            Self::Month => "%b %d",
            Self::Year | Self::Custom { .. } => "%b %Y",
        };
        date.format(format).to_string()
    }
}

/// Expenses whose date lies inside the timeframe, order preserved.
#[must_use]
pub fn filter_by_timeframe(
    expenses: &[Expense],
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Vec<Expense> {
    let (from, to) = timeframe.bounds(now);
    expenses
        .iter()
        .filter(|e| from <= e.date && e.date <= to)
        .cloned()
        .collect()
}

/// Sum of all amounts.
#[must_use]
pub fn total_amount(expenses: &[Expense]) -> f64 {
    expenses.iter().map(|e| e.amount).sum()
}

/// Category label to summed amount. Uncategorised expenses land in `"Other"`.
#[must_use]
pub fn aggregate_by_category(expenses: &[Expense]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for expense in expenses {
        *totals
            .entry(expense.category_label().to_string())
            .or_insert(0.0) += expense.amount;
    }
    totals
}

/// Category totals sorted by amount, largest first.
#[must_use]
pub fn ranked_categories(totals: &BTreeMap<String, f64>) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = totals.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// One point of the spending-over-time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub label: String,
    pub amount: f64,
}

/// Sums amounts per time bucket of the timeframe's granularity.
///
/// Buckets appear in chronological order of their earliest expense. Buckets
/// without expenses are not emitted.
#[must_use]
pub fn aggregate_by_time_bucket(expenses: &[Expense], timeframe: Timeframe) -> Vec<TimeBucket> {
    let mut by_date: Vec<&Expense> = expenses.iter().collect();
    by_date.sort_by_key(|e| e.date);

    let mut buckets: Vec<TimeBucket> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    for expense in by_date {
        let label = timeframe.bucket_label(expense.date);
        if let Some(&i) = index.get(&label) {
            buckets[i].amount += expense.amount;
        } else {
            index.insert(label.clone(), buckets.len());
            buckets.push(TimeBucket {
                label,
                amount: expense.amount,
            });
        }
    }
    buckets
}

/// Everything the analytics view renders for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub total: f64,
    pub average_per_day: f64,
    pub expense_count: usize,
    pub by_category: BTreeMap<String, f64>,
    pub top_categories: Vec<(String, f64)>,
    pub over_time: Vec<TimeBucket>,
}

/// Filters `expenses` to the timeframe and aggregates the result.
#[must_use]
pub fn build_report(expenses: &[Expense], timeframe: Timeframe, now: DateTime<Utc>) -> AnalyticsReport {
    let in_range = filter_by_timeframe(expenses, timeframe, now);
    let total = total_amount(&in_range);
    let by_category = aggregate_by_category(&in_range);
    #[allow(clippy::cast_precision_loss)]
    let average_per_day = total / timeframe.day_span() as f64;

    AnalyticsReport {
        total,
        average_per_day,
        expense_count: in_range.len(),
        top_categories: ranked_categories(&by_category),
        over_time: aggregate_by_time_bucket(&in_range, timeframe),
        by_category,
    }
}
