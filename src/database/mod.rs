use async_trait::async_trait;
use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tokio::sync::watch;

use crate::models::{
    deserialize_role, BinRecord, BinSnapshot, BinUpdate, Identity, QuarantinedBin, RawBin, Role, Tier,
    UserPatch, UserRecord, FULL_THRESHOLD, HALF_THRESHOLD,
};
use crate::store::{DataSource, Subscription, BINS_COLLECTION, CREDENTIALS_COLLECTION, USERS_COLLECTION};
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
    poll_interval: Duration,
}

/// `users` document. `_id` is the identity id.
#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    address: String,
    #[serde(default, deserialize_with = "deserialize_role")]
    role: Role,
}

impl From<UserDocument> for UserRecord {
    fn from(doc: UserDocument) -> Self {
        UserRecord {
            id: doc.id,
            name: doc.name,
            email: doc.email,
            phone: doc.phone,
            address: doc.address,
            role: doc.role,
        }
    }
}

impl From<UserRecord> for UserDocument {
    fn from(user: UserRecord) -> Self {
        UserDocument {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            address: user.address,
            role: user.role,
        }
    }
}

/// `credentials` document
#[derive(Debug, Serialize, Deserialize)]
struct CredentialDocument {
    #[serde(rename = "_id")]
    id: String,
    email: String,
    password_hash: String,
    created_at: i64,
}

impl MongoDB {
    pub async fn new(uri: &str, poll_interval: Duration) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(Duration::from_secs(300));
        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        // Extract database name from URI or use default
        let db_name = uri
            .split('/')
            .last()
            .and_then(|s| s.split('?').next())
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("smart_waste");

        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db, poll_interval };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let credentials = self.collection::<Document>(CREDENTIALS_COLLECTION);
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        match credentials.create_index(email_index).await {
            Ok(_) => log::info!("   ✅ Index created: credentials(email, unique)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let users = self.collection::<Document>(USERS_COLLECTION);
        let role_index = IndexModel::builder().keys(doc! { "role": 1 }).build();

        match users.create_index(role_index).await {
            Ok(_) => log::info!("   ✅ Index created: users(role)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");
        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    async fn load_bins(&self) -> Result<BinSnapshot, AppError> {
        let collection = self.collection::<Document>(BINS_COLLECTION);
        let mut cursor = collection
            .find(doc! {})
            .await
            .map_err(|e| AppError::DataFetch(format!("Failed to query bins: {}", e)))?;

        let mut entries = Vec::new();
        let mut unreadable = Vec::new();
        while let Some(result) = cursor.next().await {
            let document = result.map_err(|e| AppError::DataFetch(format!("Failed to read bin: {}", e)))?;
            let key = document_key(&document);
            match mongodb::bson::from_document::<RawBin>(document) {
                Ok(raw) => entries.push((key, raw)),
                Err(e) => unreadable.push(QuarantinedBin {
                    key,
                    reason: format!("unreadable document: {}", e),
                }),
            }
        }

        let mut snapshot = BinSnapshot::from_raw(entries);
        for bad in unreadable {
            log::warn!("⚠️ Quarantined bin {}: {}", bad.key, bad.reason);
            snapshot.quarantined.push(bad);
        }
        Ok(snapshot)
    }

    async fn load_bin(&self, id: &str) -> Result<BinRecord, AppError> {
        let document = self
            .collection::<Document>(BINS_COLLECTION)
            .find_one(key_filter(id))
            .await
            .map_err(|e| AppError::DataFetch(format!("Failed to read bin {}: {}", id, e)))?
            .ok_or_else(|| AppError::NotFound(format!("Bin {}", id)))?;

        let raw = mongodb::bson::from_document::<RawBin>(document)
            .map_err(|e| AppError::DataFetch(format!("Bin {} is unreadable: {}", id, e)))?;
        raw.validate(id)
            .map_err(|reason| AppError::DataFetch(format!("Bin {} is malformed: {}", id, reason)))
    }

    /// Pushes a fresh snapshot if it differs from the last one.
    /// Returns false once every subscriber is gone.
    async fn publish(&self, tx: &watch::Sender<Option<BinSnapshot>>) -> bool {
        if tx.is_closed() {
            return false;
        }
        match self.load_bins().await {
            Ok(snapshot) => {
                tx.send_if_modified(|current| {
                    if current.as_ref() == Some(&snapshot) {
                        false
                    } else {
                        *current = Some(snapshot);
                        true
                    }
                });
            }
            Err(e) => log::error!("❌ Failed to refresh bins: {}", e),
        }
        !tx.is_closed()
    }

    async fn follow_bins(self, tx: watch::Sender<Option<BinSnapshot>>) {
        if !self.publish(&tx).await {
            return;
        }

        let collection = self.collection::<Document>(BINS_COLLECTION);
        match collection.watch().await {
            Ok(mut changes) => {
                log::debug!("👀 Following {} change stream", BINS_COLLECTION);
                while let Some(event) = changes.next().await {
                    if let Err(e) = event {
                        log::warn!("⚠️ Change stream interrupted, falling back to polling: {}", e);
                        break;
                    }
                    if !self.publish(&tx).await {
                        return;
                    }
                }
            }
            Err(e) => {
                log::info!(
                    "ℹ️  Change streams unavailable ({}), polling every {:?}",
                    e,
                    self.poll_interval
                );
            }
        }

        loop {
            tokio::time::sleep(self.poll_interval).await;
            if !self.publish(&tx).await {
                return;
            }
        }
    }
}

/// String form of a document's `_id`
fn document_key(document: &Document) -> String {
    match document.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Matches a key that may have been stored as an ObjectId or a plain string
fn key_filter(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "$or": [ { "_id": oid }, { "_id": id } ] },
        Err(_) => doc! { "_id": id },
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

fn bin_set_document(update: &BinUpdate) -> Document {
    let mut set = Document::new();
    if let Some(location) = &update.location {
        // pipeline stages read "$..." strings as field paths
        set.insert("location", doc! { "$literal": location.as_str() });
    }
    if let Some(lat) = update.lat {
        set.insert("lat", lat);
    }
    if let Some(lng) = update.lng {
        set.insert("lng", lng);
    }
    if let Some(level) = update.level {
        set.insert("level", i32::from(level));
    }
    set
}

/// `status` for whatever `level` the document holds. Non-numeric levels keep
/// their old status; those bins are quarantined on read anyway.
fn status_expression() -> Document {
    doc! {
        "$switch": {
            "branches": [
                { "case": { "$not": [{ "$isNumber": "$level" }] }, "then": "$status" },
                { "case": { "$gte": ["$level", i32::from(FULL_THRESHOLD)] }, "then": Tier::Full.status_label() },
                { "case": { "$gte": ["$level", i32::from(HALF_THRESHOLD)] }, "then": Tier::Half.status_label() }
            ],
            "default": Tier::Low.status_label()
        }
    }
}

/// Field writes, then a `status` rewrite, so every bin write leaves a fresh status
fn bin_update_pipeline(update: &BinUpdate) -> Vec<Document> {
    let mut pipeline = Vec::with_capacity(2);
    let set = bin_set_document(update);
    if !set.is_empty() {
        pipeline.push(doc! { "$set": set });
    }
    pipeline.push(doc! { "$set": { "status": status_expression() } });
    pipeline
}

fn user_set_document(patch: &UserPatch) -> Document {
    let mut set = Document::new();
    if let Some(name) = &patch.name {
        set.insert("name", name.clone());
    }
    if let Some(phone) = &patch.phone {
        set.insert("phone", phone.clone());
    }
    if let Some(address) = &patch.address {
        set.insert("address", address.clone());
    }
    if let Some(role) = patch.role {
        set.insert("role", role.as_str());
    }
    set
}

#[async_trait]
impl DataSource for MongoDB {
    fn subscribe_bins(&self) -> Subscription {
        let (tx, rx) = watch::channel(None);
        let watcher = tokio::spawn(self.clone().follow_bins(tx));
        Subscription::with_watcher(rx, watcher.abort_handle())
    }

    async fn get_bins(&self) -> Result<BinSnapshot, AppError> {
        self.load_bins().await
    }

    async fn update_bin(&self, id: &str, update: &BinUpdate) -> Result<BinRecord, AppError> {
        let result = self
            .collection::<Document>(BINS_COLLECTION)
            .update_one(key_filter(id), bin_update_pipeline(update))
            .await
            .map_err(|e| AppError::Mutation(format!("Failed to update bin {}: {}", id, e)))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Bin {}", id)));
        }
        self.load_bin(id).await
    }

    async fn delete_bin(&self, id: &str) -> Result<(), AppError> {
        let result = self
            .collection::<Document>(BINS_COLLECTION)
            .delete_one(key_filter(id))
            .await
            .map_err(|e| AppError::Mutation(format!("Failed to delete bin {}: {}", id, e)))?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Bin {}", id)));
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        let mut cursor = self
            .collection::<UserDocument>(USERS_COLLECTION)
            .find(doc! {})
            .await
            .map_err(|e| AppError::DataFetch(format!("Failed to query users: {}", e)))?;

        let mut users = Vec::new();
        while let Some(result) = cursor.next().await {
            match result {
                Ok(user) => users.push(UserRecord::from(user)),
                Err(e) => log::warn!("⚠️ Skipping unreadable user document: {}", e),
            }
        }
        Ok(users)
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        self.collection::<UserDocument>(USERS_COLLECTION)
            .find_one(doc! { "_id": id })
            .await
            .map(|user| user.map(UserRecord::from))
            .map_err(|e| AppError::DataFetch(format!("Failed to read user {}: {}", id, e)))
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<UserRecord, AppError> {
        let result = self
            .collection::<UserDocument>(USERS_COLLECTION)
            .update_one(doc! { "_id": id }, doc! { "$set": user_set_document(patch) })
            .await
            .map_err(|e| AppError::Mutation(format!("Failed to update user {}: {}", id, e)))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("User {}", id)));
        }
        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", id)))
    }

    async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        let result = self
            .collection::<UserDocument>(USERS_COLLECTION)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Mutation(format!("Failed to delete user {}: {}", id, e)))?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("User {}", id)));
        }

        self.collection::<CredentialDocument>(CREDENTIALS_COLLECTION)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Mutation(format!("Failed to delete identity {}: {}", id, e)))?;
        Ok(())
    }

    async fn find_identity(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let credential = self
            .collection::<CredentialDocument>(CREDENTIALS_COLLECTION)
            .find_one(doc! { "email": email })
            .await
            .map_err(|e| AppError::DataFetch(format!("Failed to read identity: {}", e)))?;

        Ok(credential.map(|c| Identity {
            id: c.id,
            email: c.email,
            password_hash: c.password_hash,
            created_at: c.created_at,
        }))
    }

    async fn create_account(&self, identity: Identity, profile: UserRecord) -> Result<UserRecord, AppError> {
        let credential = CredentialDocument {
            id: identity.id.clone(),
            email: identity.email.clone(),
            password_hash: identity.password_hash,
            created_at: identity.created_at,
        };

        self.collection::<CredentialDocument>(CREDENTIALS_COLLECTION)
            .insert_one(&credential)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Conflict(format!("{} is already registered", identity.email))
                } else {
                    AppError::Mutation(format!("Failed to create identity: {}", e))
                }
            })?;

        let users = self.collection::<UserDocument>(USERS_COLLECTION);
        if let Err(e) = users.insert_one(UserDocument::from(profile.clone())).await {
            // Roll back the identity so the email can be used again
            if let Err(cleanup) = self
                .collection::<CredentialDocument>(CREDENTIALS_COLLECTION)
                .delete_one(doc! { "_id": identity.id.as_str() })
                .await
            {
                log::error!("❌ Failed to roll back identity {}: {}", identity.id, cleanup);
            }
            return Err(AppError::Mutation(format!("Failed to create user profile: {}", e)));
        }

        Ok(profile)
    }
}
