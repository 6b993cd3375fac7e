// services/analytics.rs
//
// Pure aggregation over the transaction set; no I/O. Revenue counts
// completed payments only, growth compares against the immediately
// preceding window of equal length.
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::transaction::{Transaction, TransactionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AnalyticsRange {
    #[serde(rename = "7days")]
    SevenDays,
    #[serde(rename = "30days")]
    ThirtyDays,
    #[serde(rename = "90days")]
    NinetyDays,
    #[serde(rename = "1year")]
    OneYear,
}

impl Default for AnalyticsRange {
    fn default() -> Self {
        AnalyticsRange::ThirtyDays
    }
}

impl AnalyticsRange {
    fn duration(&self) -> Duration {
        match self {
            AnalyticsRange::SevenDays => Duration::days(7),
            AnalyticsRange::ThirtyDays => Duration::days(30),
            AnalyticsRange::NinetyDays => Duration::days(90),
            AnalyticsRange::OneYear => Duration::days(365),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSlice {
    pub name: &'static str,
    pub value: usize,
    pub color: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RevenueBucket {
    /// `YYYY-MM-DD` for daily buckets, `YYYY-MM` for monthly.
    pub bucket: String,
    pub revenue: f64,
    pub transactions: usize,
}

#[derive(Debug, Serialize)]
pub struct PaymentAnalytics {
    pub total_revenue: f64,
    pub total_transactions: usize,
    pub success_rate: f64,
    pub average_amount: f64,
    pub revenue_growth: f64,
    pub transaction_growth: f64,
    pub status_distribution: Vec<StatusSlice>,
    pub daily_revenue: Vec<RevenueBucket>,
    pub monthly_revenue: Vec<RevenueBucket>,
}

fn revenue_of(transactions: &[&Transaction]) -> f64 {
    transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Completed)
        .map(|t| t.amount)
        .sum()
}

fn growth(current: f64, previous: f64) -> f64 {
    // A zero baseline reports 0% rather than dividing by zero.
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

fn buckets(transactions: &[&Transaction], key: impl Fn(&Transaction) -> String) -> Vec<RevenueBucket> {
    let mut map: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for t in transactions {
        let entry = map.entry(key(t)).or_default();
        entry.1 += 1;
        if t.status == TransactionStatus::Completed {
            entry.0 += t.amount;
        }
    }

    map.into_iter()
        .map(|(bucket, (revenue, transactions))| RevenueBucket {
            bucket,
            revenue,
            transactions,
        })
        .collect()
}

pub fn aggregate(
    transactions: &[Transaction],
    range: AnalyticsRange,
    now: DateTime<Utc>,
) -> PaymentAnalytics {
    let window = range.duration();
    let start = now - window;
    let previous_start = start - window;

    let in_window: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.created_at >= start && t.created_at <= now)
        .collect();
    let in_previous: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.created_at >= previous_start && t.created_at < start)
        .collect();

    let total_revenue = revenue_of(&in_window);
    let total_transactions = in_window.len();

    let count_by = |status: TransactionStatus| in_window.iter().filter(|t| t.status == status).count();
    let completed = count_by(TransactionStatus::Completed);

    let success_rate = if total_transactions > 0 {
        completed as f64 / total_transactions as f64 * 100.0
    } else {
        0.0
    };
    let average_amount = if completed > 0 {
        total_revenue / completed as f64
    } else {
        0.0
    };

    let previous_revenue = revenue_of(&in_previous);
    let revenue_growth = growth(total_revenue, previous_revenue);
    let transaction_growth = growth(total_transactions as f64, in_previous.len() as f64);

    let status_distribution = vec![
        StatusSlice {
            name: "completed",
            value: completed,
            color: "#00A651",
        },
        StatusSlice {
            name: "pending",
            value: count_by(TransactionStatus::Pending),
            color: "#FFA500",
        },
        StatusSlice {
            name: "failed",
            value: count_by(TransactionStatus::Failed),
            color: "#FF0000",
        },
        StatusSlice {
            name: "cancelled",
            value: count_by(TransactionStatus::Cancelled),
            color: "#808080",
        },
    ];

    let daily_revenue = buckets(&in_window, |t| t.created_at.format("%Y-%m-%d").to_string());
    let monthly_revenue = buckets(&in_window, |t| t.created_at.format("%Y-%m").to_string());

    PaymentAnalytics {
        total_revenue,
        total_transactions,
        success_rate,
        average_amount,
        revenue_growth,
        transaction_growth,
        status_distribution,
        daily_revenue,
        monthly_revenue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transaction::NewTransaction;

    fn tx_at(days_ago: i64, amount: f64, status: TransactionStatus, now: DateTime<Utc>) -> Transaction {
        let created = now - Duration::days(days_ago);
        let mut tx = NewTransaction {
            merchant_request_id: format!("mr-{}", days_ago),
            checkout_request_id: format!("ws_CO_{}_{}", days_ago, amount),
            amount,
            phone_number: "254712345678".into(),
            account_reference: "ACC".into(),
            transaction_desc: "Test".into(),
        }
        .into_transaction(created);
        tx.status = status;
        tx
    }

    #[test]
    fn empty_set_yields_zeros_for_every_range() {
        let now = Utc::now();
        for range in [
            AnalyticsRange::SevenDays,
            AnalyticsRange::ThirtyDays,
            AnalyticsRange::NinetyDays,
            AnalyticsRange::OneYear,
        ] {
            let analytics = aggregate(&[], range, now);
            assert_eq!(analytics.total_revenue, 0.0);
            assert_eq!(analytics.total_transactions, 0);
            assert_eq!(analytics.success_rate, 0.0);
            assert_eq!(analytics.average_amount, 0.0);
            assert_eq!(analytics.revenue_growth, 0.0);
            assert_eq!(analytics.transaction_growth, 0.0);
            assert!(analytics.daily_revenue.is_empty());
        }
    }

    #[test]
    fn thirty_day_window_example() {
        let now = Utc::now();
        let transactions = vec![
            tx_at(1, 100.0, TransactionStatus::Completed, now),
            tx_at(2, 50.0, TransactionStatus::Failed, now),
        ];

        let analytics = aggregate(&transactions, AnalyticsRange::ThirtyDays, now);
        assert_eq!(analytics.total_revenue, 100.0);
        assert_eq!(analytics.total_transactions, 2);
        assert_eq!(analytics.success_rate, 50.0);
        assert_eq!(analytics.average_amount, 100.0);
    }

    #[test]
    fn growth_compares_against_preceding_window() {
        let now = Utc::now();
        let transactions = vec![
            // Current 7-day window.
            tx_at(1, 200.0, TransactionStatus::Completed, now),
            tx_at(2, 100.0, TransactionStatus::Completed, now),
            // Previous 7-day window.
            tx_at(10, 100.0, TransactionStatus::Completed, now),
        ];

        let analytics = aggregate(&transactions, AnalyticsRange::SevenDays, now);
        assert_eq!(analytics.total_revenue, 300.0);
        assert_eq!(analytics.revenue_growth, 200.0);
        assert_eq!(analytics.transaction_growth, 100.0);
    }

    #[test]
    fn zero_baseline_reports_zero_growth() {
        let now = Utc::now();
        let transactions = vec![tx_at(1, 500.0, TransactionStatus::Completed, now)];

        let analytics = aggregate(&transactions, AnalyticsRange::SevenDays, now);
        assert_eq!(analytics.revenue_growth, 0.0);
        assert_eq!(analytics.transaction_growth, 0.0);
    }

    #[test]
    fn records_outside_the_window_are_excluded() {
        let now = Utc::now();
        let transactions = vec![
            tx_at(1, 100.0, TransactionStatus::Completed, now),
            tx_at(40, 999.0, TransactionStatus::Completed, now),
        ];

        let analytics = aggregate(&transactions, AnalyticsRange::ThirtyDays, now);
        assert_eq!(analytics.total_revenue, 100.0);
        assert_eq!(analytics.total_transactions, 1);
    }

    #[test]
    fn status_distribution_counts_all_statuses() {
        let now = Utc::now();
        let transactions = vec![
            tx_at(1, 100.0, TransactionStatus::Completed, now),
            tx_at(1, 60.0, TransactionStatus::Pending, now),
            tx_at(2, 50.0, TransactionStatus::Failed, now),
            tx_at(3, 40.0, TransactionStatus::Cancelled, now),
        ];

        let analytics = aggregate(&transactions, AnalyticsRange::ThirtyDays, now);
        let by_name: std::collections::HashMap<_, _> = analytics
            .status_distribution
            .iter()
            .map(|s| (s.name, s.value))
            .collect();

        assert_eq!(by_name["completed"], 1);
        assert_eq!(by_name["pending"], 1);
        assert_eq!(by_name["failed"], 1);
        assert_eq!(by_name["cancelled"], 1);
    }

    #[test]
    fn buckets_are_sorted_and_sum_completed_only() {
        let now = Utc::now();
        let transactions = vec![
            tx_at(3, 100.0, TransactionStatus::Completed, now),
            tx_at(1, 40.0, TransactionStatus::Failed, now),
            tx_at(1, 60.0, TransactionStatus::Completed, now),
        ];

        let analytics = aggregate(&transactions, AnalyticsRange::SevenDays, now);
        assert_eq!(analytics.daily_revenue.len(), 2);

        let older = &analytics.daily_revenue[0];
        let newer = &analytics.daily_revenue[1];
        assert!(older.bucket < newer.bucket);
        assert_eq!(older.revenue, 100.0);
        assert_eq!(older.transactions, 1);
        assert_eq!(newer.revenue, 60.0);
        assert_eq!(newer.transactions, 2);
    }
}
