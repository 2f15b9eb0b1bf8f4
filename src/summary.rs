use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{Grant, GrantStatus, Priority, StatusCount, SummaryStatistics};

pub const DEFAULT_DEADLINE_WINDOW_DAYS: i64 = 30;

/// A filter argument that is either a single value or a set of values.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: PartialEq> OneOrMany<T> {
    pub fn contains(&self, value: &T) -> bool {
        match self {
            OneOrMany::One(item) => item == value,
            OneOrMany::Many(items) => items.contains(value),
        }
    }
}

impl From<GrantStatus> for OneOrMany<GrantStatus> {
    fn from(value: GrantStatus) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Priority> for OneOrMany<Priority> {
    fn from(value: Priority) -> Self {
        OneOrMany::One(value)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        OneOrMany::Many(values)
    }
}

impl<T: Clone> From<&[T]> for OneOrMany<T> {
    fn from(values: &[T]) -> Self {
        OneOrMany::Many(values.to_vec())
    }
}

impl<T, const N: usize> From<[T; N]> for OneOrMany<T> {
    fn from(values: [T; N]) -> Self {
        OneOrMany::Many(values.into_iter().collect())
    }
}

impl<T> From<HashSet<T>> for OneOrMany<T> {
    fn from(values: HashSet<T>) -> Self {
        OneOrMany::Many(values.into_iter().collect())
    }
}

impl<T> From<BTreeSet<T>> for OneOrMany<T> {
    fn from(values: BTreeSet<T>) -> Self {
        OneOrMany::Many(values.into_iter().collect())
    }
}

/// Absent, non-finite or negative amounts count as zero.
pub fn amount_or_zero(amount: Option<f64>) -> f64 {
    match amount {
        Some(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    }
}

/// Parses a free-form amount cell such as `"12,500.00"` or `"$900"`.
/// Negative or non-finite values are rejected.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '_' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

pub fn compute_summary(grants: &[Grant], now: DateTime<Utc>) -> SummaryStatistics {
    let total_grants = grants.len();
    let total_requested: f64 = grants
        .iter()
        .map(|grant| amount_or_zero(grant.amount_requested))
        .fold(0.0, |total, amount| total + amount);
    let total_awarded: f64 = grants
        .iter()
        .map(|grant| amount_or_zero(grant.amount_awarded))
        .fold(0.0, |total, amount| total + amount);
    let awarded_count = grants
        .iter()
        .filter(|grant| grant.status == GrantStatus::Awarded)
        .count();
    let decided_count = grants
        .iter()
        .filter(|grant| grant.status.is_decided())
        .count();
    let success_rate = if decided_count > 0 {
        awarded_count as f64 / decided_count as f64 * 100.0
    } else {
        0.0
    };
    let active_applications = grants
        .iter()
        .filter(|grant| grant.status.is_active())
        .count();
    let (start, end) = deadline_window(now, DEFAULT_DEADLINE_WINDOW_DAYS);
    let upcoming_deadlines = grants
        .iter()
        .filter(|grant| within_window(grant.deadline_date, start, end))
        .count();

    SummaryStatistics {
        total_grants,
        total_requested,
        total_awarded,
        awarded_count,
        decided_count,
        success_rate,
        active_applications,
        upcoming_deadlines,
    }
}

pub fn filter_by_status<'a>(
    grants: &'a [Grant],
    statuses: impl Into<OneOrMany<GrantStatus>>,
) -> Vec<&'a Grant> {
    let statuses = statuses.into();
    grants
        .iter()
        .filter(|grant| statuses.contains(&grant.status))
        .collect()
}

pub fn filter_by_priority<'a>(
    grants: &'a [Grant],
    priorities: impl Into<OneOrMany<Priority>>,
) -> Vec<&'a Grant> {
    let priorities = priorities.into();
    grants
        .iter()
        .filter(|grant| priorities.contains(&grant.priority))
        .collect()
}

pub fn upcoming_deadlines(grants: &[Grant], now: DateTime<Utc>, window_days: i64) -> Vec<&Grant> {
    let (start, end) = deadline_window(now, window_days);
    let mut upcoming: Vec<&Grant> = grants
        .iter()
        .filter(|grant| within_window(grant.deadline_date, start, end))
        .collect();
    // sort_by_key is stable, so equal deadlines keep their input order.
    upcoming.sort_by_key(|grant| grant.deadline_date);
    upcoming
}

pub fn count_by_status(grants: &[Grant]) -> Vec<StatusCount> {
    let mut map: HashMap<GrantStatus, usize> = HashMap::new();

    for grant in grants {
        *map.entry(grant.status.clone()).or_insert(0) += 1;
    }

    let mut counts: Vec<StatusCount> = map
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();

    counts.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.status.as_str().cmp(b.status.as_str()))
    });
    counts
}

fn deadline_window(now: DateTime<Utc>, window_days: i64) -> (NaiveDate, NaiveDate) {
    let today = now.date_naive();
    let end = Duration::try_days(window_days)
        .and_then(|span| today.checked_add_signed(span))
        .unwrap_or(if window_days < 0 {
            NaiveDate::MIN
        } else {
            NaiveDate::MAX
        });
    (today, end)
}

fn within_window(deadline: Option<NaiveDate>, start: NaiveDate, end: NaiveDate) -> bool {
    matches!(deadline, Some(date) if date >= start && date <= end)
}
