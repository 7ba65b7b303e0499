//! Registry / delegator (component N): owns registered schemas and
//! store handles, and is the only way to construct a `CollectionHandle`
//! — the one-way-ownership rewrite of the original's schema ↔ delegator
//! ↔ handle reference cycle (spec.md §9).

use std::collections::BTreeMap;

use crate::error::HandleError;
use crate::handle::CollectionHandle;
use crate::schema::CollectionSchema;
use crate::store::{CacheStore, OriginStore};

pub struct Registry<C: CacheStore, O: OriginStore> {
    cache: C,
    origin: O,
    schemas: BTreeMap<String, CollectionSchema>,
}

impl<C: CacheStore, O: OriginStore> Registry<C, O> {
    pub fn new(cache: C, origin: O) -> Self {
        Self { cache, origin, schemas: BTreeMap::new() }
    }

    pub fn register(&mut self, schema: CollectionSchema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    pub fn schema(&self, collection: &str) -> Option<&CollectionSchema> {
        self.schemas.get(collection)
    }

    /// The full registered schema map, for building a `FlushScheduler`
    /// (which owns its store handles independently of `Registry` and so
    /// needs its own `Arc`-shared copy rather than a borrow).
    pub fn schemas(&self) -> &BTreeMap<String, CollectionSchema> {
        &self.schemas
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn origin(&self) -> &O {
        &self.origin
    }

    /// Builds a `CollectionHandle` for `(collection, pk)`. Does no I/O
    /// itself — matches spec.md §4.F's `bind(pk)` contract.
    pub fn bind<'a>(&'a self, collection: &str, pk: impl Into<String>) -> Result<CollectionHandle<'a, C, O>, HandleError> {
        let schema = self
            .schemas
            .get(collection)
            .ok_or_else(|| HandleError::UnknownField(collection.to_string()))?;
        Ok(CollectionHandle::new(schema, &self.cache, &self.origin, pk.into()))
    }
}
