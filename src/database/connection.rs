use std::env;

use mongodb::{Client, Database};

pub async fn get_db_client(database_url: &str) -> Database {
    let client = Client::with_uri_str(database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db_name = env::var("MONGO_DB_NAME").unwrap_or_else(|_| "mpesadb".to_string());
    let db = client.database(&db_name);

    // Verify database exists by listing collections
    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("Connected to database: {}", db_name);
            if !collections.contains(&"mpesa_transactions".to_string()) {
                tracing::warn!(
                    "'mpesa_transactions' collection not found in {}; it will be created on first write",
                    db_name
                );
            }
        }
        Err(e) => {
            tracing::error!("Database '{}' may not exist or is inaccessible: {}", db_name, e);
        }
    }

    db
}
