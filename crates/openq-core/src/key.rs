//! Query keys: the identity the cache deduplicates and stores results under.

use crate::method::HttpMethod;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An ordered list of JSON values identifying one cached operation.
///
/// Equality and hashing go through a canonical encoding with object keys
/// sorted, so two inits that differ only in field order share a key.
#[derive(Debug, Clone)]
pub struct QueryKey {
    parts: Vec<Value>,
    canonical: String,
}

impl QueryKey {
    pub fn new(parts: Vec<Value>) -> Self {
        let canonical = canonical_json(&Value::Array(parts.clone()));
        Self { parts, canonical }
    }

    /// `[method, path]` when `init` is `None`, `[method, path, init]` otherwise.
    ///
    /// An explicitly passed empty init still produces a three element key.
    pub fn operation(method: HttpMethod, path: &str, init: Option<Value>) -> Self {
        let mut parts = vec![Value::from(method.as_str()), Value::from(path)];
        if let Some(init) = init {
            parts.push(init);
        }
        Self::new(parts)
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The method element, if this is an operation key.
    pub fn method(&self) -> Option<HttpMethod> {
        self.parts.first()?.as_str()?.parse().ok()
    }

    /// The path element, if this is an operation key.
    pub fn path(&self) -> Option<&str> {
        self.parts.get(1)?.as_str()
    }

    /// The init element, absent for keys built without one.
    pub fn init(&self) -> Option<&Value> {
        self.parts.get(2)
    }

    /// Prefix match over whole elements, used for partial key filters.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        prefix.parts.len() <= self.parts.len()
            && prefix
                .parts
                .iter()
                .zip(&self.parts)
                .all(|(a, b)| canonical_json(a) == canonical_json(b))
    }

    /// Canonical string form of the key.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl Serialize for QueryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.parts.serialize(serializer)
    }
}

impl From<Vec<Value>> for QueryKey {
    fn from(parts: Vec<Value>) -> Self {
        Self::new(parts)
    }
}

/// Serialize a value with object keys in sorted order, independent of how
/// the map type underneath orders them.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
