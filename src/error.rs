//! Crate-wide error taxonomy (component K): one `thiserror` enum per
//! component boundary, aggregated into `HandleError` at the collection
//! handle surface applications actually call through.

use thiserror::Error;

use crate::codec::CodecError;
use crate::key::KeyFormatError;
use crate::schema::SchemaError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache transaction aborted after exhausting retries for key {0:?}")]
    TransactionAborted(String),
}

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("origin backend error: {0}")]
    Backend(String),
    #[error("document {collection}:{pk} not found in origin")]
    NotFound { collection: String, pk: String },
}

#[derive(Debug, Error)]
pub enum HandleError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Origin(#[from] OriginError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Key(#[from] KeyFormatError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("field {0:?} is not declared on this collection's schema")]
    UnknownField(String),
    #[error("field {field:?} is declared as {declared} but a {requested} operation was issued")]
    ShapeMismatch {
        field: String,
        declared: &'static str,
        requested: &'static str,
    },
}
