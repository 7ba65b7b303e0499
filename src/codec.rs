//! Encode/decode scalar and structured values between cache wire form
//! (strings) and in-process typed values (component A).

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A codec error at decode time.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("field {field:?}: could not parse {wire:?} as {expected}")]
    Parse {
        field: String,
        wire: String,
        expected: &'static str,
    },
    #[error("malformed extended primitive ${tag}: {reason}")]
    MalformedExtended { tag: &'static str, reason: String },
    #[error("json error decoding dict value: {0}")]
    Json(#[from] serde_json::Error),
}

/// A codec between a cache wire string and a typed value `T`.
pub trait ScalarCodec<T>: Send + Sync {
    fn field_name(&self) -> &str {
        "<unnamed>"
    }
    fn encode(&self, value: &T) -> String;
    fn decode(&self, wire: &str) -> Result<T, CodecError>;
}

/// Identity codec for unannotated scalar fields — the implicit default.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl ScalarCodec<String> for RawCodec {
    fn encode(&self, value: &String) -> String {
        value.clone()
    }
    fn decode(&self, wire: &str) -> Result<String, CodecError> {
        Ok(wire.to_string())
    }
}

macro_rules! numeric_codec {
    ($name:ident, $ty:ty, $label:literal) => {
        /// Numeric scalar codec — canonical text form in both directions.
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl ScalarCodec<$ty> for $name {
            fn encode(&self, value: &$ty) -> String {
                value.to_string()
            }
            fn decode(&self, wire: &str) -> Result<$ty, CodecError> {
                wire.parse::<$ty>().map_err(|_| CodecError::Parse {
                    field: String::new(),
                    wire: wire.to_string(),
                    expected: $label,
                })
            }
        }
    };
}

numeric_codec!(Int32Codec, i32, "int32");
numeric_codec!(Int64Codec, i64, "int64");
numeric_codec!(Float64Codec, f64, "float64");

/// Round-trips a collection's primary key between the cache's string key
/// form and the origin's typed primary-key value. Generalises the
/// original's hard-coded `long`/`int`/`str`/`float` primary-key switch.
pub trait KeyCodec: Send + Sync {
    fn encode(&self, pk: &str) -> DocValue;
}

/// Default primary-key codec: the cache's string form is the origin's
/// typed form too.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringKeyCodec;

impl KeyCodec for StringKeyCodec {
    fn encode(&self, pk: &str) -> DocValue {
        DocValue::Str(pk.to_string())
    }
}

/// Primary-key codec for collections whose origin-side key is a 64-bit
/// integer; the cache always addresses it by its decimal string form.
#[derive(Debug, Default, Clone, Copy)]
pub struct Int64KeyCodec;

impl KeyCodec for Int64KeyCodec {
    fn encode(&self, pk: &str) -> DocValue {
        pk.parse::<i64>().map(DocValue::I64).unwrap_or_else(|_| DocValue::Str(pk.to_string()))
    }
}

/// A self-describing document value, round-tripping the extended
/// primitives a plain JSON document cannot carry natively: binary blobs,
/// timestamps, arbitrary-precision decimals, and object ids.
#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Array(Vec<DocValue>),
    Object(BTreeMap<String, DocValue>),
    Binary(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Decimal(BigDecimal),
    ObjectId([u8; 12]),
}

impl DocValue {
    /// "Falsy" per the loader's hash-payload filtering rule (§4.G): null
    /// or an empty string. Numeric zero is intentionally not falsy.
    pub fn is_falsy(&self) -> bool {
        matches!(self, DocValue::Null) || matches!(self, DocValue::Str(s) if s.is_empty())
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, DocValue>> {
        match self {
            DocValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<BTreeMap<String, DocValue>> {
        match self {
            DocValue::Object(map) => Some(map),
            _ => None,
        }
    }
}

fn doc_value_to_json(value: &DocValue) -> serde_json::Value {
    match value {
        DocValue::Null => serde_json::Value::Null,
        DocValue::Bool(b) => serde_json::Value::Bool(*b),
        DocValue::I64(i) => serde_json::json!(i),
        DocValue::F64(f) => serde_json::json!(f),
        DocValue::Str(s) => serde_json::Value::String(s.clone()),
        DocValue::Array(items) => {
            serde_json::Value::Array(items.iter().map(doc_value_to_json).collect())
        }
        DocValue::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), doc_value_to_json(v)))
                .collect(),
        ),
        DocValue::Binary(bytes) => serde_json::json!({ "$binary": BASE64.encode(bytes) }),
        DocValue::Timestamp(ts) => serde_json::json!({ "$date": ts.to_rfc3339() }),
        DocValue::Decimal(d) => serde_json::json!({ "$decimal": d.to_string() }),
        DocValue::ObjectId(id) => serde_json::json!({ "$oid": hex::encode(id) }),
    }
}

fn json_to_doc_value(value: serde_json::Value) -> Result<DocValue, CodecError> {
    match value {
        serde_json::Value::Null => Ok(DocValue::Null),
        serde_json::Value::Bool(b) => Ok(DocValue::Bool(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(DocValue::I64(i))
            } else {
                Ok(DocValue::F64(n.as_f64().unwrap_or_default()))
            }
        }
        serde_json::Value::String(s) => Ok(DocValue::Str(s)),
        serde_json::Value::Array(items) => Ok(DocValue::Array(
            items
                .into_iter()
                .map(json_to_doc_value)
                .collect::<Result<_, _>>()?,
        )),
        serde_json::Value::Object(map) => {
            if map.len() == 1 {
                if let Some(binary) = map.get("$binary").and_then(|v| v.as_str()) {
                    let bytes = BASE64.decode(binary).map_err(|e| CodecError::MalformedExtended {
                        tag: "binary",
                        reason: e.to_string(),
                    })?;
                    return Ok(DocValue::Binary(bytes));
                }
                if let Some(date) = map.get("$date").and_then(|v| v.as_str()) {
                    let ts = DateTime::parse_from_rfc3339(date)
                        .map_err(|e| CodecError::MalformedExtended {
                            tag: "date",
                            reason: e.to_string(),
                        })?
                        .with_timezone(&Utc);
                    return Ok(DocValue::Timestamp(ts));
                }
                if let Some(decimal) = map.get("$decimal").and_then(|v| v.as_str()) {
                    let d: BigDecimal = decimal.parse().map_err(|_| CodecError::MalformedExtended {
                        tag: "decimal",
                        reason: format!("{decimal:?} is not a valid decimal"),
                    })?;
                    return Ok(DocValue::Decimal(d));
                }
                if let Some(oid) = map.get("$oid").and_then(|v| v.as_str()) {
                    let bytes = hex::decode(oid).map_err(|e| CodecError::MalformedExtended {
                        tag: "oid",
                        reason: e.to_string(),
                    })?;
                    let arr: [u8; 12] =
                        bytes.try_into().map_err(|_| CodecError::MalformedExtended {
                            tag: "oid",
                            reason: "object id must be exactly 12 bytes".to_string(),
                        })?;
                    return Ok(DocValue::ObjectId(arr));
                }
            }
            let mut out = BTreeMap::new();
            for (k, v) in map {
                out.insert(k, json_to_doc_value(v)?);
            }
            Ok(DocValue::Object(out))
        }
    }
}

/// Codec for nested-document / structured-value fields: serialises to a
/// self-describing JSON text form.
#[derive(Debug, Default, Clone, Copy)]
pub struct DictCodec;

impl ScalarCodec<DocValue> for DictCodec {
    fn encode(&self, value: &DocValue) -> String {
        doc_value_to_json(value).to_string()
    }

    fn decode(&self, wire: &str) -> Result<DocValue, CodecError> {
        let json: serde_json::Value = serde_json::from_str(wire)?;
        json_to_doc_value(json)
    }
}
