// services/poller.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::errors::{AppError, Result};
use crate::models::transaction::{Transaction, TransactionStatus};
use crate::store::TransactionStore;

/// Where the poller reads status from. Production reads the transaction
/// store; tests script the responses.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, transaction_id: &str) -> Result<Transaction>;
}

pub struct StoreStatusSource {
    store: Arc<dyn TransactionStore>,
}

impl StoreStatusSource {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        StoreStatusSource { store }
    }
}

#[async_trait]
impl StatusSource for StoreStatusSource {
    async fn fetch(&self, transaction_id: &str) -> Result<Transaction> {
        self.store
            .get(transaction_id)
            .await?
            .ok_or(AppError::TransactionNotFound)
    }
}

#[derive(Debug)]
pub enum PollOutcome {
    /// Payment confirmed; final transaction attached.
    Completed(Transaction),
    /// Payment failed or was cancelled.
    Failed(Transaction),
    /// Attempt budget exhausted while still pending. The record is left
    /// untouched; a late callback may still complete it.
    TimedOut,
}

/// Bounded, cooperative polling loop: one status read per attempt, a
/// fixed sleep between attempts, and a hard attempt ceiling. Dropping
/// the future cancels it cleanly since the poller only reads.
pub struct StatusPoller {
    interval: Duration,
    max_attempts: u32,
}

impl StatusPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        StatusPoller {
            interval,
            max_attempts,
        }
    }

    pub async fn poll(&self, source: &dyn StatusSource, transaction_id: &str) -> PollOutcome {
        for attempt in 1..=self.max_attempts {
            match source.fetch(transaction_id).await {
                Ok(transaction) => match transaction.status {
                    TransactionStatus::Completed => return PollOutcome::Completed(transaction),
                    TransactionStatus::Failed | TransactionStatus::Cancelled => {
                        return PollOutcome::Failed(transaction)
                    }
                    TransactionStatus::Pending => {}
                },
                // Transient failures consume an attempt and retry on the
                // same schedule.
                Err(e) => {
                    warn!(
                        "Status check {}/{} for {} failed: {}",
                        attempt, self.max_attempts, transaction_id, e
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        PollOutcome::TimedOut
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::models::transaction::NewTransaction;
    use crate::store::memory::MemoryTransactionStore;

    fn pending_transaction() -> Transaction {
        NewTransaction {
            merchant_request_id: "mr-1".into(),
            checkout_request_id: "ws_CO_1".into(),
            amount: 100.0,
            phone_number: "254712345678".into(),
            account_reference: "ACC".into(),
            transaction_desc: "Test".into(),
        }
        .into_transaction(Utc::now())
    }

    /// Replays a fixed sequence of statuses, then repeats the last one.
    struct ScriptedSource {
        script: Vec<std::result::Result<TransactionStatus, ()>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<std::result::Result<TransactionStatus, ()>>) -> Self {
            ScriptedSource {
                script,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch(&self, _transaction_id: &str) -> Result<Transaction> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.get(n).or_else(|| self.script.last()).unwrap();
            match step {
                Ok(status) => {
                    let mut tx = pending_transaction();
                    tx.status = *status;
                    Ok(tx)
                }
                Err(()) => Err(AppError::HttpClient("connection reset".into())),
            }
        }
    }

    fn fast_poller(max_attempts: u32) -> StatusPoller {
        StatusPoller::new(Duration::ZERO, max_attempts)
    }

    #[tokio::test]
    async fn completed_on_first_query_resolves_without_further_checks() {
        let source = ScriptedSource::new(vec![Ok(TransactionStatus::Completed)]);
        let outcome = fast_poller(30).poll(&source, "tx-1").await;

        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn failed_and_cancelled_both_resolve_failed() {
        for status in [TransactionStatus::Failed, TransactionStatus::Cancelled] {
            let source = ScriptedSource::new(vec![Ok(status)]);
            let outcome = fast_poller(30).poll(&source, "tx-1").await;
            assert!(matches!(outcome, PollOutcome::Failed(_)));
            assert_eq!(source.calls(), 1);
        }
    }

    #[tokio::test]
    async fn permanently_pending_times_out_after_exact_attempt_ceiling() {
        let source = ScriptedSource::new(vec![Ok(TransactionStatus::Pending)]);
        let outcome = fast_poller(30).poll(&source, "tx-1").await;

        assert!(matches!(outcome, PollOutcome::TimedOut));
        assert_eq!(source.calls(), 30);
    }

    #[tokio::test]
    async fn pending_then_completed_resolves_mid_budget() {
        let source = ScriptedSource::new(vec![
            Ok(TransactionStatus::Pending),
            Ok(TransactionStatus::Pending),
            Ok(TransactionStatus::Completed),
        ]);
        let outcome = fast_poller(30).poll(&source, "tx-1").await;

        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn transient_errors_consume_attempts_and_retry() {
        let source = ScriptedSource::new(vec![
            Err(()),
            Err(()),
            Ok(TransactionStatus::Completed),
        ]);
        let outcome = fast_poller(5).poll(&source, "tx-1").await;

        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_errors_exhaust_the_budget() {
        let source = ScriptedSource::new(vec![Err(())]);
        let outcome = fast_poller(4).poll(&source, "tx-1").await;

        assert!(matches!(outcome, PollOutcome::TimedOut));
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn store_source_reads_the_canonical_record() {
        let store = Arc::new(MemoryTransactionStore::new());
        let tx = store.create(NewTransaction {
            merchant_request_id: "mr-1".into(),
            checkout_request_id: "ws_CO_9".into(),
            amount: 75.0,
            phone_number: "254712345678".into(),
            account_reference: "ACC".into(),
            transaction_desc: "Test".into(),
        })
        .await
        .unwrap();

        let source = StoreStatusSource::new(store);
        let fetched = source.fetch(&tx.id).await.unwrap();
        assert_eq!(fetched.status, TransactionStatus::Pending);

        let missing = source.fetch("no-such-id").await.unwrap_err();
        assert!(matches!(missing, AppError::TransactionNotFound));
    }
}
