//! Occupancy and wait-time aggregates computed from a list snapshot.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::backend::BranchLists;
use super::domain::PersonRecord;
use super::taxonomy::{BranchScope, Facility};

/// Aggregates for one branch, or for the union of a scope when used as a total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchStatistics {
    pub branch: String,
    pub count: usize,
    pub complete: usize,
    pub urgent: usize,
    pub intake_dates: Vec<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_wait_days: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_wait_days: Option<f64>,
}

/// Number of intake dates falling in a period (`YYYY-MM` or `YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub facility: String,
    pub scope: String,
    pub as_of: NaiveDate,
    pub branches: Vec<BranchStatistics>,
    pub totals: BranchStatistics,
    pub monthly: Vec<TrendPoint>,
    pub daily: Vec<TrendPoint>,
}

/// Builds the report for every real branch in `scope`, in declaration order.
pub fn aggregate(
    facility: &Facility,
    scope: &BranchScope,
    lists: &BranchLists,
    today: NaiveDate,
) -> AggregateReport {
    let branches: Vec<BranchStatistics> = facility
        .branches_in(scope)
        .into_iter()
        .map(|branch| branch_statistics(branch, lists.records(branch), today))
        .collect();

    let mut totals = BranchStatistics {
        branch: scope.label().to_string(),
        count: 0,
        complete: 0,
        urgent: 0,
        intake_dates: Vec::new(),
        average_wait_days: None,
        median_wait_days: None,
    };
    for stats in &branches {
        totals.count += stats.count;
        totals.complete += stats.complete;
        totals.urgent += stats.urgent;
        totals.intake_dates.extend(stats.intake_dates.iter().copied());
    }
    let waits = wait_days(&totals.intake_dates, today);
    totals.average_wait_days = mean(&waits);
    totals.median_wait_days = median(&waits);

    AggregateReport {
        facility: facility.name.clone(),
        scope: scope.label().to_string(),
        as_of: today,
        monthly: monthly_trend(&totals.intake_dates),
        daily: daily_trend(&totals.intake_dates),
        branches,
        totals,
    }
}

pub fn branch_statistics(
    branch: &str,
    records: &[PersonRecord],
    today: NaiveDate,
) -> BranchStatistics {
    let intake_dates: Vec<NaiveDate> = records
        .iter()
        .filter_map(PersonRecord::intake_date)
        .collect();
    let waits = wait_days(&intake_dates, today);

    BranchStatistics {
        branch: branch.to_string(),
        count: records.len(),
        complete: records
            .iter()
            .filter(|record| record.checklist.is_complete())
            .count(),
        urgent: records.iter().filter(|record| record.urgent).count(),
        average_wait_days: mean(&waits),
        median_wait_days: median(&waits),
        intake_dates,
    }
}

pub fn monthly_trend(dates: &[NaiveDate]) -> Vec<TrendPoint> {
    group_by_period(dates, "%Y-%m")
}

pub fn daily_trend(dates: &[NaiveDate]) -> Vec<TrendPoint> {
    group_by_period(dates, "%Y-%m-%d")
}

fn group_by_period(dates: &[NaiveDate], format: &str) -> Vec<TrendPoint> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for date in dates {
        *counts.entry(date.format(format).to_string()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(period, count)| TrendPoint { period, count })
        .collect()
}

fn wait_days(dates: &[NaiveDate], today: NaiveDate) -> Vec<f64> {
    dates
        .iter()
        .map(|date| (today - *date).num_days() as f64)
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[middle - 1] + sorted[middle]) / 2.0)
    } else {
        Some(sorted[middle])
    }
}
