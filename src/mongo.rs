use anyhow::{anyhow, Result};
use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, IndexOptions},
    Client, Database, IndexModel,
};

use crate::config::AppConfig;

/// Opens the client, pings the server, and ensures indexes. The returned
/// handle is owned by the process lifetime and shared by all handlers
/// through the request context.
pub async fn connect(cfg: &AppConfig) -> Result<Database> {
    let client = Client::with_uri_str(&cfg.mongo_uri)
        .await
        .map_err(|e| anyhow!("Mongo connect error: {e}"))?;

    let database = client.database(&cfg.mongo_db);

    database
        .run_command(doc! { "ping": 1 }, None)
        .await
        .map_err(|e| anyhow!("Mongo ping error: {e}"))?;

    ensure_indexes(&database).await?;

    Ok(database)
}

/// Default list order: newest first by created_at, then _id.
pub fn sort_created_at_desc() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .build()
}

async fn ensure_indexes(db: &Database) -> Result<()> {
    // admins: unique username. The store, not the application pre-check,
    // is what actually enforces uniqueness under concurrent registration.
    let admins = db.collection::<Document>("admins");
    let uniq_admin_username = IndexModel::builder()
        .keys(doc! { "username": 1 })
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(Some("uniq_admin_username".into()))
                .build(),
        )
        .build();
    admins
        .create_index(uniq_admin_username, None)
        .await
        .map_err(|e| anyhow!("Mongo index error: {e}"))?;

    // products: list order
    let products = db.collection::<Document>("products");
    let idx_created_at = IndexModel::builder()
        .keys(doc! { "created_at": -1 })
        .options(
            IndexOptions::builder()
                .name(Some("idx_products_created_at".into()))
                .build(),
        )
        .build();
    if let Err(e) = products.create_index(idx_created_at, None).await {
        tracing::warn!(target: "mongo", "products created_at index not created: {e}");
    }

    Ok(())
}
