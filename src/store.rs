use chrono::Utc;
use log::{error, warn};
use serde_json::json;

use crate::remote::{timestamp_to_millis, Document, JsonMap, RemoteDataService, RemoteError};
use crate::session::SessionManager;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("{collection}/{id}: {message}")]
    Malformed {
        collection: String,
        id: String,
        message: String,
    },
}

/// Boundary between a typed entity and its stored document. `to_fields`
/// emits the backend-native representation (timestamps as epoch millis),
/// `from_document` translates back to the semantic types.
pub trait Entity: Clone {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
    fn from_document(doc: &Document) -> Result<Self, StoreError>;
    fn to_fields(&self) -> JsonMap;
}

/// Cache-then-write-through store over one remote collection.
///
/// The cache is mutated only after the remote acknowledges a write, so a
/// failed write-through leaves it at its pre-call state. Fetch commits are
/// guarded by the session epoch observed when the fetch began; a commit for
/// a superseded principal is discarded.
pub struct EntityStore<T: Entity> {
    items: Vec<T>,
    loading: bool,
    fetched_epoch: Option<u64>,
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        EntityStore {
            items: Vec::new(),
            loading: true,
            fetched_epoch: None,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|e| e.id() == id)
    }

    /// True when the cache has not been fetched for the given session epoch.
    pub fn needs_fetch(&self, epoch: u64) -> bool {
        self.fetched_epoch != Some(epoch)
    }

    /// Drops all cached state; used on logout.
    pub fn clear(&mut self) {
        self.items.clear();
        self.loading = true;
        self.fetched_epoch = None;
    }

    /// Full-collection read, replacing the cache. Gated on a principal being
    /// present; returns Ok(false) when there is none or when the result was
    /// discarded as stale.
    pub fn refresh(
        &mut self,
        remote: &dyn RemoteDataService,
        session: &SessionManager,
    ) -> Result<bool, StoreError> {
        if session.principal().is_none() {
            return Ok(false);
        }
        let epoch = session.epoch();
        self.loading = true;
        let result = Self::read_collection(remote);
        self.loading = false;
        let items = result.map_err(|e| {
            error!("fetch_all {} failed: {e}", T::COLLECTION);
            e
        })?;
        Ok(self.apply_fetched(epoch, session.epoch(), items))
    }

    fn read_collection(remote: &dyn RemoteDataService) -> Result<Vec<T>, StoreError> {
        let docs = remote.get_all(T::COLLECTION)?;
        let mut items = Vec::with_capacity(docs.len());
        for doc in &docs {
            items.push(T::from_document(doc)?);
        }
        Ok(items)
    }

    /// Commits a fetched collection. The commit is discarded when the
    /// session epoch moved on since the fetch began (a logout or login
    /// superseded the in-flight read).
    pub fn apply_fetched(&mut self, fetched_epoch: u64, current_epoch: u64, items: Vec<T>) -> bool {
        if fetched_epoch != current_epoch {
            warn!(
                "discarding stale {} fetch (epoch {fetched_epoch}, now {current_epoch})",
                T::COLLECTION
            );
            return false;
        }
        self.items = items;
        self.fetched_epoch = Some(fetched_epoch);
        self.loading = false;
        true
    }

    /// Writes a new document with `createdAt = updatedAt = now`, then
    /// appends the entity to the cache under the remote-assigned id.
    pub fn add(
        &mut self,
        remote: &dyn RemoteDataService,
        mut fields: JsonMap,
    ) -> Result<T, StoreError> {
        let now = timestamp_to_millis(Utc::now());
        fields.insert("createdAt".to_string(), json!(now));
        fields.insert("updatedAt".to_string(), json!(now));
        let id = remote.create(T::COLLECTION, fields.clone()).map_err(|e| {
            error!("add to {} failed: {e}", T::COLLECTION);
            e
        })?;
        let entity = T::from_document(&Document { id, fields })?;
        self.items.push(entity.clone());
        Ok(entity)
    }

    /// Writes only the supplied fields plus a refreshed `updatedAt`, then
    /// merges them into the cached entity. Returns the merged entity, or
    /// None when the id is not cached (the remote write still happened).
    pub fn update(
        &mut self,
        remote: &dyn RemoteDataService,
        id: &str,
        mut patch: JsonMap,
    ) -> Result<Option<T>, StoreError> {
        // id is immutable and createdAt is set exactly once.
        patch.remove("id");
        patch.remove("createdAt");
        patch.insert(
            "updatedAt".to_string(),
            json!(timestamp_to_millis(Utc::now())),
        );
        remote.update(T::COLLECTION, id, &patch).map_err(|e| {
            error!("update {}/{id} failed: {e}", T::COLLECTION);
            e
        })?;
        let Some(pos) = self.items.iter().position(|e| e.id() == id) else {
            return Ok(None);
        };
        let mut fields = self.items[pos].to_fields();
        for (key, value) in &patch {
            fields.insert(key.clone(), value.clone());
        }
        let merged = T::from_document(&Document {
            id: id.to_string(),
            fields,
        })?;
        self.items[pos] = merged.clone();
        Ok(Some(merged))
    }

    /// Deletes the remote document, then drops the cached entity.
    pub fn delete(&mut self, remote: &dyn RemoteDataService, id: &str) -> Result<(), StoreError> {
        remote.delete(T::COLLECTION, id).map_err(|e| {
            error!("delete {}/{id} failed: {e}", T::COLLECTION);
            e
        })?;
        self.items.retain(|e| e.id() != id);
        Ok(())
    }
}
