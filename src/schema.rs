//! Per-collection field layout descriptors (component B).
//!
//! A `CollectionSchema` tells the loader and the handle which cache
//! shape backs each field: a plain hash scalar, or one of the three
//! structured shapes (set / list / zset). It is built once at startup
//! via `SchemaBuilder` and then shared (read-only) across handles.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::codec::{KeyCodec, StringKeyCodec};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("field {0:?} declared more than once")]
    DuplicateField(String),
    #[error("primary key field {0:?} cannot also be declared as a structured field")]
    PrimaryKeyCollision(String),
    #[error("collection {0:?} has no primary key configured")]
    MissingPrimaryKey(String),
    #[error("zset field {0:?} needs both a member and a score sub-field name")]
    ZsetMissingSubFields(String),
}

/// The cache representation of a structured (non-scalar) field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    /// Redis SET: unordered, unique members.
    Set,
    /// Redis LIST: ordered, duplicates allowed.
    List,
    /// Redis ZSET: materialised as `{member_name, score_name}` records,
    /// read back in ascending score order.
    Zset { member_name: String, score_name: String },
}

/// One field's declared shape plus whether it participates in dirty
/// tracking and write-back (all structured and scalar fields do; only
/// the primary key itself is exempt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub shape: Option<FieldShape>,
    pub ignored: bool,
}

impl FieldDescriptor {
    pub fn is_structured(&self) -> bool {
        self.shape.is_some()
    }
}

/// The full field layout for one collection.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub name: String,
    pub primary_key: String,
    pub primary_key_codec: Arc<dyn KeyCodec>,
    fields: BTreeMap<String, FieldDescriptor>,
}

impl CollectionSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// The primary key's origin-typed representation, per `KeyCodec`.
    pub fn encode_primary_key(&self, pk: &str) -> crate::codec::DocValue {
        self.primary_key_codec.encode(pk)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn structured_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values().filter(|f| f.is_structured())
    }
}

/// Fluent constructor for a `CollectionSchema`; mirrors the declarative
/// per-collection field declarations this crate replaces.
pub struct SchemaBuilder {
    name: String,
    primary_key: Option<String>,
    primary_key_codec: Arc<dyn KeyCodec>,
    fields: BTreeMap<String, FieldDescriptor>,
    error: Option<SchemaError>,
}

impl SchemaBuilder {
    pub fn new(collection_name: impl Into<String>) -> Self {
        Self {
            name: collection_name.into(),
            primary_key: None,
            primary_key_codec: Arc::new(StringKeyCodec),
            fields: BTreeMap::new(),
            error: None,
        }
    }

    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    /// Declares how the primary key round-trips to the origin's typed
    /// value; defaults to `StringKeyCodec` (the cache's string form is
    /// also the origin's form).
    pub fn primary_key_codec(mut self, codec: Arc<dyn KeyCodec>) -> Self {
        self.primary_key_codec = codec;
        self
    }

    fn insert(&mut self, descriptor: FieldDescriptor) {
        if self.error.is_some() {
            return;
        }
        if self.fields.contains_key(&descriptor.name) {
            self.error = Some(SchemaError::DuplicateField(descriptor.name));
            return;
        }
        self.fields.insert(descriptor.name.clone(), descriptor);
    }

    pub fn scalar_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.insert(FieldDescriptor { name, shape: None, ignored: false });
        self
    }

    pub fn set_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.insert(FieldDescriptor { name, shape: Some(FieldShape::Set), ignored: false });
        self
    }

    pub fn list_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.insert(FieldDescriptor { name, shape: Some(FieldShape::List), ignored: false });
        self
    }

    pub fn zset_field(
        mut self,
        name: impl Into<String>,
        member_name: impl Into<String>,
        score_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.insert(FieldDescriptor {
            name,
            shape: Some(FieldShape::Zset {
                member_name: member_name.into(),
                score_name: score_name.into(),
            }),
            ignored: false,
        });
        self
    }

    /// Declares a field present on the origin document that this layer
    /// never caches or tracks (e.g. a computed or legacy column).
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.insert(FieldDescriptor { name, shape: None, ignored: true });
        self
    }

    pub fn build(self) -> Result<CollectionSchema, SchemaError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let primary_key = self
            .primary_key
            .ok_or_else(|| SchemaError::MissingPrimaryKey(self.name.clone()))?;

        if self.fields.contains_key(&primary_key) {
            return Err(SchemaError::PrimaryKeyCollision(primary_key));
        }

        for field in self.fields.values() {
            if let Some(FieldShape::Zset { member_name, score_name }) = &field.shape {
                if member_name.is_empty() || score_name.is_empty() {
                    return Err(SchemaError::ZsetMissingSubFields(field.name.clone()));
                }
            }
        }

        Ok(CollectionSchema {
            name: self.name,
            primary_key,
            primary_key_codec: self.primary_key_codec,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_schema_with_mixed_field_shapes() {
        let schema = SchemaBuilder::new("tags")
            .primary_key("id")
            .scalar_field("name")
            .set_field("file_ids")
            .list_field("recent_events")
            .zset_field("scores", "member", "score")
            .ignore("legacy_column")
            .build()
            .unwrap();

        assert_eq!(schema.name, "tags");
        assert_eq!(schema.primary_key, "id");
        assert!(!schema.field("name").unwrap().is_structured());
        assert!(schema.field("file_ids").unwrap().is_structured());
        assert!(schema.field("legacy_column").unwrap().ignored);
        assert_eq!(schema.structured_fields().count(), 3);
    }

    #[test]
    fn rejects_missing_primary_key() {
        let err = SchemaBuilder::new("tags").scalar_field("name").build().unwrap_err();
        assert_eq!(err, SchemaError::MissingPrimaryKey("tags".to_string()));
    }

    #[test]
    fn rejects_primary_key_collision() {
        let err = SchemaBuilder::new("tags")
            .primary_key("id")
            .scalar_field("id")
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::PrimaryKeyCollision("id".to_string()));
    }

    #[test]
    fn rejects_zset_with_empty_subfield_names() {
        let err = SchemaBuilder::new("tags")
            .primary_key("id")
            .zset_field("scores", "", "score")
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::ZsetMissingSubFields("scores".to_string()));
    }

    #[test]
    fn defaults_to_string_key_codec() {
        let schema = SchemaBuilder::new("tags").primary_key("id").build().unwrap();
        assert_eq!(schema.encode_primary_key("7"), crate::codec::DocValue::Str("7".to_string()));
    }

    #[test]
    fn int64_key_codec_round_trips_numeric_primary_keys() {
        let schema = SchemaBuilder::new("tags")
            .primary_key("id")
            .primary_key_codec(std::sync::Arc::new(crate::codec::Int64KeyCodec))
            .build()
            .unwrap();
        assert_eq!(schema.encode_primary_key("7"), crate::codec::DocValue::I64(7));
    }

    #[test]
    fn rejects_duplicate_field_declaration() {
        let err = SchemaBuilder::new("tags")
            .primary_key("id")
            .scalar_field("x")
            .set_field("x")
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("x".to_string()));
    }
}
