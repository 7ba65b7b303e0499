//! # cacheback
//!
//! A write-back, LRU-bounded caching layer fronting a document origin
//! store with a fast cache store. Application code reads and mutates
//! documents against the cache at the same granularity as the origin —
//! top-level scalar fields plus nested sets, lists, and sorted sets —
//! and a background [`scheduler::FlushScheduler`] asynchronously writes
//! modified values back to the origin, enforcing a cache size budget by
//! evicting least-recently-used entries.
//!
//! ## Architecture
//!
//! - `codec`: scalar and structured value encode/decode, including the
//!   self-describing `DocValue` wire format
//! - `schema`: per-collection field layout, built via `SchemaBuilder`
//! - `key`: canonical cache key composition and parsing
//! - `lease`: short-TTL per-key leases serialising flush against mutation
//! - `index`: the cache-wide dirty set and LRU queue
//! - `handle`: the per-`(schema, primary key)` read/write façade
//! - `scheduler`: the background flush-and-evict control loop
//! - `store`: the `CacheStore`/`OriginStore` trait boundary plus the
//!   `redis`/`sqlx` adapters
//! - `registry`: owns schemas and store handles, constructs handles
//! - `config`: the tunable surface (watermarks, intervals, schedule)
//! - `error`: the crate-wide error taxonomy
//! - `testing`: in-memory fakes for both store traits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod error;
pub mod handle;
pub mod index;
pub mod key;
pub mod lease;
pub mod registry;
pub mod scheduler;
pub mod schema;
pub mod store;

pub mod testing;

pub use codec::{CodecError, DocValue, Int64KeyCodec, KeyCodec, StringKeyCodec};
pub use error::HandleError;
pub use handle::{CollectionHandle, ZsetRecord};
pub use key::{document_key, field_key, lease_key, parse_key};
pub use registry::Registry;
pub use schema::{CollectionSchema, SchemaBuilder, SchemaError};
pub use scheduler::FlushScheduler;
pub use store::{CacheStore, OriginStore, RedisCacheStore, SqlxOriginStore};
