use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::query::{Filter, ListQuery, Scalar, SortKey};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Collection
///
/// The document collections the backend persists. Each maps onto one
/// `(id UUID, doc JSONB)` table in Postgres and one map in the memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Articles,
    Fixtures,
    Merchandise,
    Players,
    Teams,
    Tournaments,
    Users,
    Bookings,
}

/// A document field the store keeps unique, and the name of the index that
/// enforces it in Postgres.
#[derive(Debug, Clone, Copy)]
pub struct UniqueKey {
    pub field: &'static str,
    pub index: &'static str,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Articles,
        Collection::Fixtures,
        Collection::Merchandise,
        Collection::Players,
        Collection::Teams,
        Collection::Tournaments,
        Collection::Users,
        Collection::Bookings,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Collection::Articles => "articles",
            Collection::Fixtures => "fixtures",
            Collection::Merchandise => "merchandise",
            Collection::Players => "players",
            Collection::Teams => "teams",
            Collection::Tournaments => "tournaments",
            Collection::Users => "users",
            Collection::Bookings => "bookings",
        }
    }

    pub fn unique_keys(self) -> &'static [UniqueKey] {
        match self {
            Collection::Articles => &[UniqueKey {
                field: "slug",
                index: "articles_slug_key",
            }],
            Collection::Merchandise => &[UniqueKey {
                field: "slug",
                index: "merchandise_slug_key",
            }],
            Collection::Players => &[UniqueKey {
                field: "jerseyNumber",
                index: "players_jersey_number_key",
            }],
            Collection::Users => &[
                UniqueKey {
                    field: "username",
                    index: "users_username_key",
                },
                UniqueKey {
                    field: "email",
                    index: "users_email_key",
                },
            ],
            _ => &[],
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A write collided with a unique key. Expected under concurrency; callers
    /// report it to the client rather than treating it as a fault.
    #[error("duplicate `{field}` in {collection}")]
    Conflict {
        collection: Collection,
        field: &'static str,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// DocumentStore Trait
///
/// Collection-oriented persistence seam. Documents are JSON objects carrying
/// their own `id`; filters and sort keys come from the query module so every
/// implementation answers list requests identically.
///
/// Implementations must order results by the requested keys and then by `id`
/// ascending, and must reject writes that duplicate a collection's unique keys
/// with [`StoreError::Conflict`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: Collection, id: Uuid, doc: Value) -> StoreResult<()>;

    /// Returns false if no document with `id` exists.
    async fn replace(&self, collection: Collection, id: Uuid, doc: Value) -> StoreResult<bool>;

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>>;

    /// Adds `by` to the top-level numeric `field` in place, treating a missing
    /// value as zero, and returns the updated document. Other fields are left
    /// as stored, so a concurrent `replace` is never undone.
    async fn increment(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
        by: i64,
    ) -> StoreResult<Option<Value>>;

    /// Returns the removed document, if any.
    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>>;

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: &[SortKey],
        skip: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Value>>;

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;
}

/// StoreState
///
/// The shared handle to whichever store the process was started with.
pub type StoreState = Arc<dyn DocumentStore>;

/// A typed document living in one collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> Uuid;
}

/// One page of a list request plus the unpaged match count.
#[derive(Debug, Clone)]
pub struct ListPage {
    pub data: Vec<Value>,
    pub total: u64,
}

/// Repository
///
/// Typed façade over a [`DocumentStore`]. Handlers speak in records; this
/// layer does the JSON encoding and decoding.
#[derive(Clone)]
pub struct Repository {
    store: StoreState,
}

impl Repository {
    pub fn new(store: StoreState) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &StoreState {
        &self.store
    }

    pub async fn get<T: Record>(&self, id: Uuid) -> StoreResult<Option<T>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find<T: Record>(
        &self,
        filter: &Filter,
        sort: &[SortKey],
        limit: Option<u64>,
    ) -> StoreResult<Vec<T>> {
        self.store
            .find(T::COLLECTION, filter, sort, 0, limit)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }

    pub async fn find_one<T: Record>(&self, filter: &Filter) -> StoreResult<Option<T>> {
        Ok(self.find(filter, &[], Some(1)).await?.into_iter().next())
    }

    pub async fn insert<T: Record>(&self, record: &T) -> StoreResult<()> {
        let doc = serde_json::to_value(record)?;
        self.store.insert(T::COLLECTION, record.id(), doc).await
    }

    /// Writes the full record back. Returns false if it was deleted meanwhile.
    pub async fn save<T: Record>(&self, record: &T) -> StoreResult<bool> {
        let doc = serde_json::to_value(record)?;
        self.store.replace(T::COLLECTION, record.id(), doc).await
    }

    /// Bumps one counter field without rewriting the rest of the record.
    pub async fn increment<T: Record>(
        &self,
        id: Uuid,
        field: &str,
        by: i64,
    ) -> StoreResult<Option<T>> {
        match self.store.increment(T::COLLECTION, id, field, by).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn delete<T: Record>(&self, id: Uuid) -> StoreResult<Option<T>> {
        match self.store.delete(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.store.count(collection, filter).await
    }

    /// list
    ///
    /// Runs a translated list request: one count over the filter, one page
    /// fetch, then the projection.
    pub async fn list(&self, collection: Collection, query: &ListQuery) -> StoreResult<ListPage> {
        let total = self.store.count(collection, &query.filter).await?;
        let data = self
            .store
            .find(
                collection,
                &query.filter,
                &query.sort,
                query.skip(),
                Some(query.limit),
            )
            .await?
            .into_iter()
            .map(|doc| query.project(doc))
            .collect();
        Ok(ListPage { data, total })
    }

    /// Fetches the records whose ids appear in `ids`, in no particular order.
    pub async fn get_many<T: Record>(&self, ids: &[Uuid]) -> StoreResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::new().within("id", id_scalars(ids));
        self.find(&filter, &[], None).await
    }

    /// True when every id in `ids` names an existing document.
    pub async fn all_exist(&self, collection: Collection, ids: &[Uuid]) -> StoreResult<bool> {
        let distinct: BTreeSet<Uuid> = ids.iter().copied().collect();
        if distinct.is_empty() {
            return Ok(true);
        }
        let distinct: Vec<Uuid> = distinct.into_iter().collect();
        let filter = Filter::new().within("id", id_scalars(&distinct));
        let found = self.store.count(collection, &filter).await?;
        Ok(found == distinct.len() as u64)
    }
}

fn id_scalars(ids: &[Uuid]) -> Vec<Scalar> {
    ids.iter().map(|id| Scalar::Text(id.to_string())).collect()
}
