use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use tracing::info;

use crate::errors::Result;
use crate::models::transaction::{NewTransaction, Transaction, TransactionStatus, TransactionUpdate};
use crate::store::TransactionStore;

const COLLECTION: &str = "mpesa_transactions";

/// MongoDB-backed store. Records are kept as whole documents and
/// updates are single-document replacements, so the backend's
/// per-document atomicity carries the store contract.
#[derive(Clone)]
pub struct MongoTransactionStore {
    collection: Collection<Transaction>,
}

impl MongoTransactionStore {
    pub fn new(db: &Database) -> Self {
        MongoTransactionStore {
            collection: db.collection(COLLECTION),
        }
    }

    /// The checkout request id is the callback's lookup key; a duplicate
    /// would make callbacks ambiguous.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "checkout_request_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection.create_index(index).await?;
        info!("Unique index ensured on {}.checkout_request_id", COLLECTION);
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MongoTransactionStore {
    async fn create(&self, new: NewTransaction) -> Result<Transaction> {
        let transaction = new.into_transaction(Utc::now());
        self.collection.insert_one(&transaction).await?;
        Ok(transaction)
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>> {
        let found = self.collection.find_one(doc! { "_id": id }).await?;
        Ok(found)
    }

    async fn get_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Transaction>> {
        let found = self
            .collection
            .find_one(doc! { "checkout_request_id": checkout_request_id })
            .await?;
        Ok(found)
    }

    async fn update(&self, id: &str, update: TransactionUpdate) -> Result<Option<Transaction>> {
        let Some(mut transaction) = self.get(id).await? else {
            return Ok(None);
        };

        transaction.apply(update, Utc::now());
        self.collection
            .replace_one(doc! { "_id": id }, &transaction)
            .await?;

        Ok(Some(transaction))
    }

    async fn list_all(&self) -> Result<Vec<Transaction>> {
        let cursor = self.collection.find(doc! {}).await?;
        let mut transactions: Vec<Transaction> = cursor.try_collect().await?;

        // Sort by created_at descending
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        let cursor = self
            .collection
            .find(doc! { "status": status.as_str() })
            .await?;
        let mut transactions: Vec<Transaction> = cursor.try_collect().await?;

        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
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
