use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::models::transaction::{NewTransaction, Transaction, TransactionStatus, TransactionUpdate};
use crate::store::TransactionStore;

/// In-memory transaction store for tests. Same contract as the MongoDB
/// implementation, backed by a `Vec` behind an async lock.
#[derive(Clone, Default)]
pub struct MemoryTransactionStore {
    records: Arc<RwLock<Vec<Transaction>>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record directly, bypassing `create`, so tests can build
    /// histories with chosen timestamps and statuses.
    pub async fn seed(&self, transaction: Transaction) {
        self.records.write().await.push(transaction);
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn create(&self, new: NewTransaction) -> Result<Transaction> {
        let transaction = new.into_transaction(Utc::now());
        self.records.write().await.push(transaction.clone());
        Ok(transaction)
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn get_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Transaction>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|t| t.checkout_request_id == checkout_request_id)
            .cloned())
    }

    async fn update(&self, id: &str, update: TransactionUpdate) -> Result<Option<Transaction>> {
        let mut records = self.records.write().await;
        let Some(transaction) = records.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };

        transaction.apply(update, Utc::now());
        Ok(Some(transaction.clone()))
    }

    async fn list_all(&self) -> Result<Vec<Transaction>> {
        let mut transactions = self.records.read().await.clone();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        let mut transactions = self.list_all().await?;
        transactions.retain(|t| t.status == status);
        Ok(transactions)
    }

    async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let mut transactions = self.list_all().await?;
        transactions.retain(|t| t.created_at >= start && t.created_at <= end);
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn seeded(days_ago: i64, status: TransactionStatus, now: DateTime<Utc>) -> Transaction {
        let mut tx = NewTransaction {
            merchant_request_id: format!("mr-{}", days_ago),
            checkout_request_id: format!("ws_CO_{}", days_ago),
            amount: 100.0,
            phone_number: "254712345678".into(),
            account_reference: "ACC".into(),
            transaction_desc: "Test".into(),
        }
        .into_transaction(now - Duration::days(days_ago));
        tx.status = status;
        tx
    }

    #[tokio::test]
    async fn list_all_is_newest_first() {
        let store = MemoryTransactionStore::new();
        let now = Utc::now();
        store.seed(seeded(3, TransactionStatus::Completed, now)).await;
        store.seed(seeded(1, TransactionStatus::Pending, now)).await;
        store.seed(seeded(2, TransactionStatus::Failed, now)).await;

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].created_at > all[1].created_at);
        assert!(all[1].created_at > all[2].created_at);
    }

    #[tokio::test]
    async fn list_by_status_filters_over_list_all() {
        let store = MemoryTransactionStore::new();
        let now = Utc::now();
        store.seed(seeded(1, TransactionStatus::Completed, now)).await;
        store.seed(seeded(2, TransactionStatus::Failed, now)).await;

        let completed = store
            .list_by_status(TransactionStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn list_by_date_range_is_inclusive() {
        let store = MemoryTransactionStore::new();
        let now = Utc::now();
        store.seed(seeded(1, TransactionStatus::Pending, now)).await;
        store.seed(seeded(5, TransactionStatus::Pending, now)).await;

        let recent = store
            .list_by_date_range(now - Duration::days(2), now)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn update_applies_partial_fields_and_stamps_updated_at() {
        let store = MemoryTransactionStore::new();
        let tx = store
            .create(NewTransaction {
                merchant_request_id: "mr-1".into(),
                checkout_request_id: "ws_CO_1".into(),
                amount: 100.0,
                phone_number: "254712345678".into(),
                account_reference: "ACC".into(),
                transaction_desc: "Test".into(),
            })
            .await
            .unwrap();

        let updated = store
            .update(
                &tx.id,
                TransactionUpdate {
                    status: Some(TransactionStatus::Completed),
                    mpesa_receipt_number: Some("NLJ7RT61SV".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, TransactionStatus::Completed);
        assert_eq!(updated.amount, 100.0);
        assert!(updated.updated_at >= tx.updated_at);

        let missing = store
            .update("no-such-id", TransactionUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
