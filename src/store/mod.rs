use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::models::transaction::{NewTransaction, Transaction, TransactionStatus, TransactionUpdate};

mod mongo;
pub use mongo::MongoTransactionStore;

#[cfg(test)]
pub mod memory;

/// Persistence contract for payment records. Every operation touches at
/// most one record and relies on the backend for single-row atomicity;
/// status-transition rules live in the callback handler, not here.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists a new record with a fresh id, `pending` status and both
    /// timestamps set to now. On failure the caller must assume the
    /// record does not exist.
    async fn create(&self, new: NewTransaction) -> Result<Transaction>;

    async fn get(&self, id: &str) -> Result<Option<Transaction>>;

    /// Lookup by the provider's checkout request id, unique per
    /// initiated payment.
    async fn get_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Transaction>>;

    /// Applies only the supplied fields and stamps `updated_at`.
    async fn update(&self, id: &str, update: TransactionUpdate) -> Result<Option<Transaction>>;

    /// All records, newest first by creation time.
    async fn list_all(&self) -> Result<Vec<Transaction>>;

    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>>;

    async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
}
