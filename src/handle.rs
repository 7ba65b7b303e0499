//! Collection handle (component F) and loader (component G).
//!
//! A `CollectionHandle` is a per-`(schema, primary key)` façade built
//! only through `Registry::bind` (§9's one-way-ownership rewrite of the
//! original's schema/delegator/handle reference cycle: the handle takes
//! its store references as constructor parameters, never stores a back
//! reference to the registry).

use std::collections::BTreeMap;

use crate::codec::{DictCodec, DocValue, ScalarCodec};
use crate::error::HandleError;
use crate::index::{DirtyIndex, LruIndex};
use crate::key::{document_key, field_key};
use crate::lease::LeaseManager;
use crate::schema::{CollectionSchema, FieldShape};
use crate::store::{CacheStore, OriginStore, StructuredRebuild};

/// A record read back from a zset-shaped field, in the `{member_name:
/// m, score_name: s}` form callers see per spec.md §4.F.
#[derive(Debug, Clone, PartialEq)]
pub struct ZsetRecord {
    pub member: String,
    pub score: f64,
}

/// Per-operation transient state: the just-loaded snapshot and the
/// dirty-suppression flag, confined to one call rather than leaking
/// across operations (§9's rewrite of the original's module-global
/// `_document_just_loaded_from_mongo` toggle).
#[derive(Default)]
struct OperationContext {
    suppress_dirty: bool,
    snapshot_hash: Option<BTreeMap<String, String>>,
    snapshot_structured: BTreeMap<String, StructuredSnapshot>,
}

#[derive(Clone)]
enum StructuredSnapshot {
    Set(Vec<String>),
    List(Vec<String>),
    Zset(Vec<ZsetRecord>),
}

pub struct CollectionHandle<'a, C: CacheStore, O: OriginStore> {
    schema: &'a CollectionSchema,
    cache: &'a C,
    origin: &'a O,
    pk: String,
}

impl<'a, C: CacheStore, O: OriginStore> CollectionHandle<'a, C, O> {
    pub(crate) fn new(schema: &'a CollectionSchema, cache: &'a C, origin: &'a O, pk: String) -> Self {
        Self { schema, cache, origin, pk }
    }

    fn document_key(&self) -> String {
        document_key(&self.schema.name, &self.pk)
    }

    /// The bound primary key in the origin's typed form, per the
    /// schema's declared `KeyCodec`.
    pub fn primary_key_typed(&self) -> DocValue {
        self.schema.encode_primary_key(&self.pk)
    }

    fn field_key(&self, field: &str) -> String {
        field_key(&self.schema.name, &self.pk, field)
    }

    fn dirty(&self) -> DirtyIndex<'a, C> {
        DirtyIndex::new(self.cache)
    }

    fn lru(&self) -> LruIndex<'a, C> {
        LruIndex::new(self.cache)
    }

    fn field_or_unknown<'s>(&'s self, field: &str) -> Result<&'s crate::schema::FieldDescriptor, HandleError> {
        self.schema
            .field(field)
            .ok_or_else(|| HandleError::UnknownField(field.to_string()))
    }

    // ---- Loader (component G) --------------------------------------

    /// `ensure_present` per spec.md §4.G. `fields` names the structured
    /// fields the caller needs; `need_hash` additionally requires the
    /// scalar hash. Returns the populated `OperationContext` snapshot.
    async fn ensure_present(
        &self,
        fields: &[&str],
        need_hash: bool,
    ) -> Result<OperationContext, HandleError> {
        let mut ctx = OperationContext { suppress_dirty: true, ..Default::default() };
        let lease = LeaseManager::new(self.cache);

        let mut missing_fields = Vec::new();
        for &field in fields {
            let key = self.field_key(field);
            self.cache
                .set_with_expiry(&crate::key::lease_key(&key), &lease.announce(), crate::lease::DEFAULT_LEASE_TTL)
                .await?;
            self.lru().touch(&key).await?;
            if !self.cache.exists(&key).await? {
                missing_fields.push(field);
            }
        }

        let mut hash_missing = false;
        if need_hash {
            let key = self.document_key();
            self.cache
                .set_with_expiry(&crate::key::lease_key(&key), &lease.announce(), crate::lease::DEFAULT_LEASE_TTL)
                .await?;
            self.lru().touch(&key).await?;
            hash_missing = !self.cache.exists(&key).await?;
        }

        if missing_fields.is_empty() && !hash_missing {
            ctx.suppress_dirty = false;
            return Ok(ctx);
        }

        let origin_doc = self
            .origin
            .find_one(&self.schema.name, &self.schema.primary_key, &self.pk, &[self.schema.primary_key.clone()])
            .await?;

        let Some(origin_doc) = origin_doc else {
            ctx.suppress_dirty = false;
            return Ok(ctx);
        };

        let mut remaining = origin_doc.into_object().unwrap_or_default();

        for &field in &missing_fields {
            let descriptor = self.field_or_unknown(field)?;
            let Some(shape) = &descriptor.shape else {
                continue;
            };
            let value = remaining.remove(field).unwrap_or(DocValue::Null);
            let snapshot = self.rebuild_structured(field, shape, value, &ctx).await?;
            ctx.snapshot_structured.insert(field.to_string(), snapshot);
        }

        if need_hash && hash_missing {
            let mut wire_fields = Vec::new();
            let mut snapshot_hash = BTreeMap::new();
            for (name, value) in &remaining {
                if self.schema.field(name).map(|f| f.is_structured() || f.ignored).unwrap_or(false) {
                    continue;
                }
                let wire = doc_value_to_wire(value);
                if let Some(wire) = &wire {
                    snapshot_hash.insert(name.clone(), wire.clone());
                } else {
                    snapshot_hash.insert(name.clone(), String::new());
                }
                if !is_falsy(value) {
                    if let Some(wire) = wire {
                        wire_fields.push((name.clone(), wire));
                    }
                }
            }
            self.cache.hash_mset(&self.document_key(), &wire_fields).await?;
            ctx.snapshot_hash = Some(snapshot_hash);
        }

        ctx.suppress_dirty = false;
        Ok(ctx)
    }

    async fn rebuild_structured(
        &self,
        field: &str,
        shape: &FieldShape,
        value: DocValue,
        ctx: &OperationContext,
    ) -> Result<StructuredSnapshot, HandleError> {
        let key = self.field_key(field);

        match shape {
            FieldShape::Set => {
                let members = doc_value_as_string_list(&value);
                self.cache.atomic_rebuild(&key, StructuredRebuild::Set(members.clone())).await?;
                if !ctx.suppress_dirty {
                    self.dirty().mark(&key).await?;
                }
                self.lru().touch(&key).await?;
                Ok(StructuredSnapshot::Set(members))
            }
            FieldShape::List => {
                let members = doc_value_as_string_list(&value);
                self.cache.atomic_rebuild(&key, StructuredRebuild::List(members.clone())).await?;
                if !ctx.suppress_dirty {
                    self.dirty().mark(&key).await?;
                }
                self.lru().touch(&key).await?;
                Ok(StructuredSnapshot::List(members))
            }
            FieldShape::Zset { member_name, score_name } => {
                let records = doc_value_as_zset_records(&value, member_name, score_name);
                let pairs: Vec<(f64, String)> = records.iter().map(|r| (r.score, r.member.clone())).collect();
                self.cache.atomic_rebuild(&key, StructuredRebuild::Zset(pairs)).await?;
                if !ctx.suppress_dirty {
                    self.dirty().mark(&key).await?;
                }
                self.lru().touch(&key).await?;
                Ok(StructuredSnapshot::Zset(records))
            }
        }
    }

    // ---- Scalar fields -----------------------------------------------

    pub async fn get_scalar(&self, field: &str) -> Result<Option<String>, HandleError> {
        self.field_or_unknown(field)?;
        let ctx = self.ensure_present(&[], true).await?;
        if let Some(hash) = &ctx.snapshot_hash {
            if let Some(value) = hash.get(field) {
                return Ok(if value.is_empty() { None } else { Some(value.clone()) });
            }
        }
        self.cache.hash_get(&self.document_key(), field).await.map_err(HandleError::from)
    }

    /// `None` deletes the field and writes the null through to the
    /// origin immediately without marking the document key dirty.
    pub async fn set_scalar(&self, field: &str, value: Option<&str>) -> Result<(), HandleError> {
        self.field_or_unknown(field)?;
        let key = self.document_key();

        match value {
            None => {
                self.cache.hash_del(&key, field).await?;
                let mut patch = BTreeMap::new();
                patch.insert(field.to_string(), DocValue::Null);
                self.origin
                    .update_set(&self.schema.name, &self.schema.primary_key, &self.pk, DocValue::Object(patch))
                    .await?;
                Ok(())
            }
            Some(value) => {
                self.cache.hash_set(&key, field, value).await?;
                self.dirty().mark(&key).await?;
                self.lru().touch(&key).await?;
                Ok(())
            }
        }
    }

    /// Replaces multiple fields in one round trip, per spec.md §4.F
    /// `update`: structured entries go through the full-replace path,
    /// remaining null entries delete without marking dirty, and
    /// remaining non-null entries are written via one `hash_mset`.
    pub async fn update(&self, partial: BTreeMap<String, DocValue>) -> Result<(), HandleError> {
        let mut scalar_sets = Vec::new();
        let key = self.document_key();

        for (field, value) in partial {
            let descriptor = self.field_or_unknown(&field)?.clone();
            if let Some(shape) = descriptor.shape.clone() {
                let ctx = OperationContext::default();
                self.rebuild_structured(&field, &shape, value, &ctx).await?;
                continue;
            }
            if matches!(value, DocValue::Null) {
                self.cache.hash_del(&key, &field).await?;
                let mut patch = BTreeMap::new();
                patch.insert(field, DocValue::Null);
                self.origin
                    .update_set(&self.schema.name, &self.schema.primary_key, &self.pk, DocValue::Object(patch))
                    .await?;
            } else if let Some(wire) = doc_value_to_wire(&value) {
                scalar_sets.push((field, wire));
            }
        }

        if !scalar_sets.is_empty() {
            self.cache.hash_mset(&key, &scalar_sets).await?;
            self.dirty().mark(&key).await?;
            self.lru().touch(&key).await?;
        }

        Ok(())
    }

    // ---- Structured fields: Set ---------------------------------------

    pub async fn set_add(&self, field: &str, members: &[String]) -> Result<u64, HandleError> {
        self.require_shape(field, "set")?;
        let key = self.field_key(field);
        let added = self.cache.set_add(&key, members).await?;
        self.dirty().mark(&key).await?;
        self.lru().touch(&key).await?;
        Ok(added)
    }

    pub async fn set_remove(&self, field: &str, members: &[String]) -> Result<u64, HandleError> {
        self.require_shape(field, "set")?;
        let key = self.field_key(field);
        let removed = self.cache.set_remove(&key, members).await?;
        self.dirty().mark(&key).await?;
        self.lru().touch(&key).await?;
        Ok(removed)
    }

    pub async fn set_card(&self, field: &str) -> Result<u64, HandleError> {
        self.require_shape(field, "set")?;
        let _ = self.ensure_present(&[field], false).await?;
        Ok(self.cache.set_card(&self.field_key(field)).await?)
    }

    pub async fn set_is_member(&self, field: &str, member: &str) -> Result<bool, HandleError> {
        self.require_shape(field, "set")?;
        let _ = self.ensure_present(&[field], false).await?;
        Ok(self.cache.set_is_member(&self.field_key(field), member).await?)
    }

    pub async fn set_members(&self, field: &str) -> Result<Vec<String>, HandleError> {
        self.require_shape(field, "set")?;
        let ctx = self.ensure_present(&[field], false).await?;
        if let Some(StructuredSnapshot::Set(members)) = ctx.snapshot_structured.get(field) {
            return Ok(members.clone());
        }
        Ok(self.cache.set_members(&self.field_key(field)).await?)
    }

    // ---- Structured fields: List ---------------------------------------

    pub async fn list_push_right(&self, field: &str, values: &[String]) -> Result<u64, HandleError> {
        self.require_shape(field, "list")?;
        let key = self.field_key(field);
        let len = self.cache.list_push_right(&key, values).await?;
        self.dirty().mark(&key).await?;
        self.lru().touch(&key).await?;
        Ok(len)
    }

    pub async fn list_pop_left(&self, field: &str) -> Result<Option<String>, HandleError> {
        self.require_shape(field, "list")?;
        let key = self.field_key(field);
        let value = self.cache.list_pop_left(&key).await?;
        self.dirty().mark(&key).await?;
        self.lru().touch(&key).await?;
        Ok(value)
    }

    pub async fn list_remove(&self, field: &str, count: i64, value: &str) -> Result<u64, HandleError> {
        self.require_shape(field, "list")?;
        let key = self.field_key(field);
        let removed = self.cache.list_rem(&key, count, value).await?;
        self.dirty().mark(&key).await?;
        self.lru().touch(&key).await?;
        Ok(removed)
    }

    pub async fn list_trim(&self, field: &str, start: i64, stop: i64) -> Result<(), HandleError> {
        self.require_shape(field, "list")?;
        let key = self.field_key(field);
        self.cache.list_trim(&key, start, stop).await?;
        self.dirty().mark(&key).await?;
        self.lru().touch(&key).await?;
        Ok(())
    }

    pub async fn list_len(&self, field: &str) -> Result<u64, HandleError> {
        self.require_shape(field, "list")?;
        let _ = self.ensure_present(&[field], false).await?;
        Ok(self.cache.list_len(&self.field_key(field)).await?)
    }

    pub async fn list_index(&self, field: &str, index: i64) -> Result<Option<String>, HandleError> {
        self.require_shape(field, "list")?;
        let _ = self.ensure_present(&[field], false).await?;
        Ok(self.cache.list_index(&self.field_key(field), index).await?)
    }

    pub async fn list_range(&self, field: &str, start: i64, stop: i64) -> Result<Vec<String>, HandleError> {
        self.require_shape(field, "list")?;
        let ctx = self.ensure_present(&[field], false).await?;
        if let Some(StructuredSnapshot::List(members)) = ctx.snapshot_structured.get(field) {
            return Ok(slice_like_redis(members, start, stop));
        }
        Ok(self.cache.list_range(&self.field_key(field), start, stop).await?)
    }

    // ---- Structured fields: Zset ---------------------------------------

    pub async fn zset_add(&self, field: &str, records: &[ZsetRecord]) -> Result<u64, HandleError> {
        self.require_shape(field, "zset")?;
        let key = self.field_key(field);
        let pairs: Vec<(f64, String)> = records.iter().map(|r| (r.score, r.member.clone())).collect();
        let added = self.cache.zset_add(&key, &pairs).await?;
        self.dirty().mark(&key).await?;
        self.lru().touch(&key).await?;
        Ok(added)
    }

    pub async fn zset_remove(&self, field: &str, members: &[String]) -> Result<u64, HandleError> {
        self.require_shape(field, "zset")?;
        let key = self.field_key(field);
        let removed = self.cache.zset_rem(&key, members).await?;
        self.dirty().mark(&key).await?;
        self.lru().touch(&key).await?;
        Ok(removed)
    }

    pub async fn zset_card(&self, field: &str) -> Result<u64, HandleError> {
        self.require_shape(field, "zset")?;
        let _ = self.ensure_present(&[field], false).await?;
        Ok(self.cache.zset_card(&self.field_key(field)).await?)
    }

    pub async fn zset_score(&self, field: &str, member: &str) -> Result<Option<f64>, HandleError> {
        self.require_shape(field, "zset")?;
        let _ = self.ensure_present(&[field], false).await?;
        Ok(self.cache.zset_score(&self.field_key(field), member).await?)
    }

    pub async fn zset_range(&self, field: &str, start: i64, stop: i64) -> Result<Vec<ZsetRecord>, HandleError> {
        self.require_shape(field, "zset")?;
        let ctx = self.ensure_present(&[field], false).await?;
        if let Some(StructuredSnapshot::Zset(records)) = ctx.snapshot_structured.get(field) {
            return Ok(slice_like_redis(records, start, stop));
        }
        let pairs = self.cache.zset_range(&self.field_key(field), start, stop).await?;
        Ok(pairs.into_iter().map(|(member, score)| ZsetRecord { member, score }).collect())
    }

    /// Full replace of a structured field, per spec.md §4.F
    /// `set_structured`: delete then rebuild within one cache round
    /// trip, then mark dirty/LRU (unless called during a load).
    pub async fn set_structured(&self, field: &str, value: DocValue) -> Result<(), HandleError> {
        let descriptor = self.field_or_unknown(field)?.clone();
        let Some(shape) = descriptor.shape else {
            return Err(HandleError::ShapeMismatch { field: field.to_string(), declared: "scalar", requested: "structured" });
        };
        let ctx = OperationContext::default();
        self.rebuild_structured(field, &shape, value, &ctx).await?;
        Ok(())
    }

    fn require_shape(&self, field: &str, requested: &'static str) -> Result<(), HandleError> {
        let descriptor = self.field_or_unknown(field)?;
        let matches = match (&descriptor.shape, requested) {
            (Some(FieldShape::Set), "set") => true,
            (Some(FieldShape::List), "list") => true,
            (Some(FieldShape::Zset { .. }), "zset") => true,
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(HandleError::ShapeMismatch {
                field: field.to_string(),
                declared: descriptor.shape.as_ref().map(shape_name).unwrap_or("scalar"),
                requested,
            })
        }
    }

    // ---- find / write_back --------------------------------------------

    /// `find(pk, projection)` per spec.md §4.F. `None` loads everything;
    /// `Some(&[])` is the original's "load nothing, return empty map"
    /// edge case; `Some(fields)` loads and returns only those fields
    /// (absent fields map to `None`).
    pub async fn find(&self, projection: Option<&[&str]>) -> Result<BTreeMap<String, Option<DocValue>>, HandleError> {
        let Some(fields) = projection else {
            return self.find_all().await;
        };
        if fields.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut structured_fields = Vec::new();
        let mut need_hash = false;
        for &field in fields {
            match self.schema.field(field) {
                Some(descriptor) if descriptor.is_structured() => structured_fields.push(field),
                Some(_) => need_hash = true,
                None => {}
            }
        }

        let ctx = self.ensure_present(&structured_fields, need_hash).await?;
        let mut out = BTreeMap::new();
        for &field in fields {
            match self.schema.field(field) {
                Some(descriptor) if descriptor.is_structured() => {
                    out.insert(field.to_string(), self.read_structured_snapshot(field, &ctx).await?);
                }
                Some(_) => {
                    let value = self.cache.hash_get(&self.document_key(), field).await?;
                    out.insert(field.to_string(), value.map(DocValue::Str));
                }
                None => {
                    out.insert(field.to_string(), None);
                }
            }
        }
        Ok(out)
    }

    async fn find_all(&self) -> Result<BTreeMap<String, Option<DocValue>>, HandleError> {
        let structured: Vec<&str> = self.schema.structured_fields().map(|f| f.name.as_str()).collect();
        let ctx = self.ensure_present(&structured, true).await?;

        let mut out = BTreeMap::new();
        for descriptor in self.schema.fields() {
            if descriptor.ignored {
                continue;
            }
            if descriptor.is_structured() {
                out.insert(descriptor.name.clone(), self.read_structured_snapshot(&descriptor.name, &ctx).await?);
            } else {
                let value = self.cache.hash_get(&self.document_key(), &descriptor.name).await?;
                out.insert(descriptor.name.clone(), value.map(DocValue::Str));
            }
        }
        Ok(out)
    }

    async fn read_structured_snapshot(&self, field: &str, ctx: &OperationContext) -> Result<Option<DocValue>, HandleError> {
        let descriptor = self.field_or_unknown(field)?;
        let Some(shape) = descriptor.shape.clone() else {
            return Ok(None);
        };
        if let Some(snapshot) = ctx.snapshot_structured.get(field) {
            return Ok(Some(structured_snapshot_to_doc_value(snapshot, &shape)));
        }
        let key = self.field_key(field);
        match &shape {
            FieldShape::Set => {
                let members = self.cache.set_members(&key).await?;
                Ok(Some(DocValue::Array(members.iter().map(|m| wire_to_doc_value(m)).collect())))
            }
            FieldShape::List => {
                let members = self.cache.list_range(&key, 0, -1).await?;
                Ok(Some(DocValue::Array(members.iter().map(|m| wire_to_doc_value(m)).collect())))
            }
            FieldShape::Zset { member_name, score_name } => {
                let pairs = self.cache.zset_range(&key, 0, -1).await?;
                Ok(Some(DocValue::Array(
                    pairs
                        .into_iter()
                        .map(|(member, score)| zset_pair_to_doc_value(&member, score, member_name, score_name))
                        .collect(),
                )))
            }
        }
    }

    /// Synchronous write-back per spec.md §4.F. With `field` omitted,
    /// writes the whole hash through; with `field` given, writes that
    /// one structured value through as a single origin field update.
    pub async fn write_back(&self, field: Option<&str>) -> Result<(), HandleError> {
        match field {
            None => {
                let hash = self.cache.hash_get_all(&self.document_key()).await?;
                let mut patch = BTreeMap::new();
                for (field, wire) in hash {
                    patch.insert(field, DocValue::Str(wire));
                }
                self.origin
                    .update_set(&self.schema.name, &self.schema.primary_key, &self.pk, DocValue::Object(patch))
                    .await?;
            }
            Some(field) => {
                let value = self
                    .read_structured_snapshot(field, &OperationContext::default())
                    .await?
                    .unwrap_or(DocValue::Null);
                let mut patch = BTreeMap::new();
                patch.insert(field.to_string(), value);
                self.origin
                    .update_set(&self.schema.name, &self.schema.primary_key, &self.pk, DocValue::Object(patch))
                    .await?;
            }
        }
        Ok(())
    }
}

fn shape_name(shape: &FieldShape) -> &'static str {
    match shape {
        FieldShape::Set => "set",
        FieldShape::List => "list",
        FieldShape::Zset { .. } => "zset",
    }
}

fn structured_snapshot_to_doc_value(snapshot: &StructuredSnapshot, shape: &FieldShape) -> DocValue {
    match snapshot {
        StructuredSnapshot::Set(members) | StructuredSnapshot::List(members) => {
            DocValue::Array(members.iter().map(|m| wire_to_doc_value(m)).collect())
        }
        StructuredSnapshot::Zset(records) => {
            let (member_name, score_name) = match shape {
                FieldShape::Zset { member_name, score_name } => (member_name.as_str(), score_name.as_str()),
                _ => ("member", "score"),
            };
            DocValue::Array(
                records
                    .iter()
                    .map(|r| zset_pair_to_doc_value(&r.member, r.score, member_name, score_name))
                    .collect(),
            )
        }
    }
}

/// Decodes one structured-field wire member back to a `DocValue`,
/// inverting `doc_value_to_wire`'s `DictCodec` fallback for non-scalar
/// values. A wire string that isn't valid `DictCodec` JSON is a plain
/// scalar member and is kept as-is.
pub(crate) fn wire_to_doc_value(wire: &str) -> DocValue {
    DictCodec.decode(wire).unwrap_or_else(|_| DocValue::Str(wire.to_string()))
}

/// Builds the `{member_name: m, score_name: s}` record callers see for
/// one zset entry, decoding the member through `wire_to_doc_value` so a
/// structured member round-trips the same way Set/List members do.
pub(crate) fn zset_pair_to_doc_value(member: &str, score: f64, member_name: &str, score_name: &str) -> DocValue {
    let mut object = BTreeMap::new();
    object.insert(member_name.to_string(), wire_to_doc_value(member));
    object.insert(score_name.to_string(), DocValue::F64(score));
    DocValue::Object(object)
}

fn doc_value_to_wire(value: &DocValue) -> Option<String> {
    match value {
        DocValue::Null => None,
        DocValue::Str(s) => Some(s.clone()),
        DocValue::I64(i) => Some(i.to_string()),
        DocValue::F64(f) => Some(f.to_string()),
        DocValue::Bool(b) => Some(b.to_string()),
        other => Some(crate::codec::DictCodec.encode(other)),
    }
}

fn is_falsy(value: &DocValue) -> bool {
    value.is_falsy()
}

fn doc_value_as_string_list(value: &DocValue) -> Vec<String> {
    match value {
        DocValue::Array(items) => items.iter().filter_map(doc_value_to_wire).collect(),
        DocValue::Null => Vec::new(),
        other => doc_value_to_wire(other).into_iter().collect(),
    }
}

fn doc_value_as_zset_records(value: &DocValue, member_name: &str, score_name: &str) -> Vec<ZsetRecord> {
    let DocValue::Array(items) = value else { return Vec::new() };
    items
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let member = object.get(member_name).and_then(doc_value_to_wire)?;
            let score = object.get(score_name).and_then(doc_value_as_f64).unwrap_or(0.0);
            Some(ZsetRecord { member, score })
        })
        .collect()
}

fn doc_value_as_f64(value: &DocValue) -> Option<f64> {
    match value {
        DocValue::F64(f) => Some(*f),
        DocValue::I64(i) => Some(*i as f64),
        DocValue::Str(s) => s.parse().ok(),
        _ => None,
    }
}

fn slice_like_redis<T: Clone>(items: &[T], start: i64, stop: i64) -> Vec<T> {
    let len = items.len() as i64;
    if len == 0 {
        return Vec::new();
    }
    let norm = |i: i64| -> i64 { if i < 0 { (len + i).max(0) } else { i } };
    let start = norm(start).min(len - 1).max(0);
    let stop = norm(stop).min(len - 1);
    if stop < start {
        return Vec::new();
    }
    items[start as usize..=stop as usize].to_vec()
}
