//! Read-side aggregation over metric records (DORA-style statistics).
//!
//! These are pure functions over already-loaded rows; they hold no
//! invariants of their own. The one binding convention is null-to-zero:
//! an empty sample reports zero for every statistic rather than failing
//! or returning null, which callers of the JSON API rely on.

use crate::domain::Metric;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Summary statistics over a set of durations, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    /// Arithmetic mean, rounded to two decimals.
    pub mean: f64,

    /// Median, rounded to two decimals.
    pub median: f64,

    /// 90th percentile, rounded to two decimals.
    pub p90: f64,

    /// Smallest sample.
    pub min: i64,

    /// Largest sample.
    pub max: i64,

    /// Unit of every duration field.
    pub unit: String,

    /// Number of samples the statistics were computed over.
    pub sample_size: usize,
}

impl DurationStats {
    fn from_samples(samples: &[i64]) -> Self {
        if samples.is_empty() {
            return Self::zero();
        }

        Self {
            mean: round2(mean(samples)),
            median: round2(median(samples)),
            p90: round2(percentile(samples, 90.0)),
            min: samples.iter().copied().min().unwrap_or(0),
            max: samples.iter().copied().max().unwrap_or(0),
            unit: "minutes".to_string(),
            sample_size: samples.len(),
        }
    }

    fn zero() -> Self {
        Self {
            mean: 0.0,
            median: 0.0,
            p90: 0.0,
            min: 0,
            max: 0,
            unit: "minutes".to_string(),
            sample_size: 0,
        }
    }
}

/// Deployment counts over trailing windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentFrequency {
    /// Deployments in the last day.
    pub daily: usize,

    /// Deployments in the last 7 days.
    pub weekly: usize,

    /// Deployments in the last 30 days.
    pub monthly: usize,

    /// Deployments per day over the last day.
    pub daily_avg: f64,

    /// Deployments per day over the last 7 days.
    pub weekly_avg: f64,

    /// Deployments per day over the last 30 days.
    pub monthly_avg: f64,
}

/// Failed changes as a share of all deployments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeFailureRate {
    /// Number of metric records with a deployment date.
    pub total_deployments: usize,

    /// Number of records flagged as failures.
    pub failures: usize,

    /// Failure percentage, rounded to two decimals; zero when there are
    /// no deployments.
    pub failure_rate_percentage: f64,
}

/// Completed tickets as a share of all tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionStats {
    /// Total tickets on the board.
    pub total_tickets: usize,

    /// Tickets currently in the "done" state.
    pub completed_tickets: usize,

    /// Completion percentage, rounded to two decimals; zero when the
    /// board is empty.
    pub completion_rate_percentage: f64,
}

/// The full metrics payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Lead time statistics.
    pub lead_time: DurationStats,

    /// Deployment frequency.
    pub deployment_frequency: DeploymentFrequency,

    /// Change failure rate.
    pub change_failure_rate: ChangeFailureRate,

    /// Time-to-restore statistics over failed changes.
    pub time_to_restore: DurationStats,

    /// Ticket completion rate.
    pub completion_rate: CompletionStats,
}

/// Lead time statistics over all records that carry a lead time.
pub fn lead_time_stats(metrics: &[Metric]) -> DurationStats {
    let samples: Vec<i64> = metrics.iter().filter_map(|m| m.lead_time).collect();
    DurationStats::from_samples(&samples)
}

/// Time-to-restore statistics over failed changes with a restoration time.
pub fn time_to_restore_stats(metrics: &[Metric]) -> DurationStats {
    let samples: Vec<i64> = metrics
        .iter()
        .filter(|m| m.change_failure)
        .filter_map(|m| m.restoration_time)
        .collect();
    DurationStats::from_samples(&samples)
}

/// Deployment counts in the trailing day, week, and month before `now`.
pub fn deployment_frequency(metrics: &[Metric], now: DateTime<Utc>) -> DeploymentFrequency {
    let count_since = |cutoff: DateTime<Utc>| {
        metrics
            .iter()
            .filter(|m| m.deployment_date.is_some_and(|d| d >= cutoff))
            .count()
    };

    let daily = count_since(now - Duration::days(1));
    let weekly = count_since(now - Duration::days(7));
    let monthly = count_since(now - Duration::days(30));

    DeploymentFrequency {
        daily,
        weekly,
        monthly,
        daily_avg: round2(daily as f64),
        weekly_avg: round2(weekly as f64 / 7.0),
        monthly_avg: round2(monthly as f64 / 30.0),
    }
}

/// Failure rate over all records that carry a deployment date.
pub fn change_failure_rate(metrics: &[Metric]) -> ChangeFailureRate {
    let total_deployments = metrics.iter().filter(|m| m.deployment_date.is_some()).count();
    let failures = metrics.iter().filter(|m| m.change_failure).count();

    let failure_rate_percentage = if total_deployments > 0 {
        round2(failures as f64 / total_deployments as f64 * 100.0)
    } else {
        0.0
    };

    ChangeFailureRate {
        total_deployments,
        failures,
        failure_rate_percentage,
    }
}

/// Completion rate given total and completed ticket counts.
pub fn completion_rate(total_tickets: usize, completed_tickets: usize) -> CompletionStats {
    let completion_rate_percentage = if total_tickets > 0 {
        round2(completed_tickets as f64 / total_tickets as f64 * 100.0)
    } else {
        0.0
    };

    CompletionStats {
        total_tickets,
        completed_tickets,
        completion_rate_percentage,
    }
}

/// Assemble the full metrics payload.
pub fn report(
    metrics: &[Metric],
    total_tickets: usize,
    completed_tickets: usize,
    now: DateTime<Utc>,
) -> MetricsReport {
    MetricsReport {
        lead_time: lead_time_stats(metrics),
        deployment_frequency: deployment_frequency(metrics, now),
        change_failure_rate: change_failure_rate(metrics),
        time_to_restore: time_to_restore_stats(metrics),
        completion_rate: completion_rate(total_tickets, completed_tickets),
    }
}

fn mean(samples: &[i64]) -> f64 {
    samples.iter().sum::<i64>() as f64 / samples.len() as f64
}

fn median(samples: &[i64]) -> f64 {
    percentile(samples, 50.0)
}

/// Linear-interpolation percentile over an unsorted sample set.
fn percentile(samples: &[i64], p: f64) -> f64 {
    let mut sorted: Vec<i64> = samples.to_vec();
    sorted.sort_unstable();

    let n = sorted.len();
    if n == 1 {
        return sorted[0] as f64;
    }

    let rank = p / 100.0 * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower] as f64;
    }

    let weight = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - weight) + sorted[upper] as f64 * weight
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
