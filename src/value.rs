use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A PackStream-encodable value: the canonical in-memory form carried
/// through the codec, messages, and records.
///
/// `Dictionary` preserves insertion order on the wire (§3); callers are
/// responsible for key uniqueness. `Structure` is the escape hatch for
/// anything the codec's registry doesn't have a typed wrapper for.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    List(Vec<Value>),
    Dictionary(Dictionary),
    Structure(Structure),
}

/// An ordered string-keyed map. A thin wrapper over `Vec<(String, Value)>`
/// rather than a `HashMap` so key order survives encode/decode round-trips.
#[derive(Debug, Clone, Default)]
pub struct Dictionary(pub(crate) Vec<(String, Value)>);

impl Dictionary {
    pub fn new() -> Self {
        Dictionary(Vec::new())
    }

    pub fn with_capacity(cap: usize) -> Self {
        Dictionary(Vec::with_capacity(cap))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.0.push((key, value));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        // Map equality, not wire-order equality: iteration order is a
        // serialization detail, not part of the value's identity.
        let lhs: BTreeMap<_, _> = self.0.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let rhs: BTreeMap<_, _> = other.0.iter().map(|(k, v)| (k.as_str(), v)).collect();
        lhs == rhs
    }
}

impl FromIterator<(String, Value)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Dictionary(iter.into_iter().collect())
    }
}

impl IntoIterator for Dictionary {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A tagged structure: the carrier for Bolt messages and graph values
/// alike. `tag` is 0..=127, `fields` holds at most 15 entries (§3, §4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub tag: u8,
    pub fields: Vec<Value>,
}

impl Structure {
    pub fn new(tag: u8, fields: Vec<Value>) -> Result<Self> {
        if fields.len() > 15 {
            return Err(Error::InvalidMessage(format!(
                "structure tag {tag:#04x} has {} fields, max is 15",
                fields.len()
            )));
        }
        Ok(Structure { tag, fields })
    }

    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }
}

impl Value {
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(Error::TypeMismatch { expected: "Boolean", found: other.kind() }),
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            other => Err(Error::TypeMismatch { expected: "Integer", found: other.kind() }),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(Error::TypeMismatch { expected: "Float", found: other.kind() }),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            other => Err(Error::TypeMismatch { expected: "String", found: other.kind() }),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b.as_slice()),
            other => Err(Error::TypeMismatch { expected: "Bytes", found: other.kind() }),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(l) => Ok(l.as_slice()),
            other => Err(Error::TypeMismatch { expected: "List", found: other.kind() }),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Value::Dictionary(d) => Ok(d),
            other => Err(Error::TypeMismatch { expected: "Dictionary", found: other.kind() }),
        }
    }

    pub fn as_structure(&self) -> Result<&Structure> {
        match self {
            Value::Structure(s) => Ok(s),
            other => Err(Error::TypeMismatch { expected: "Structure", found: other.kind() }),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Bytes(_) => "Bytes",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Dictionary(_) => "Dictionary",
            Value::Structure(_) => "Structure",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bytes(b) => write!(f, "#{}bytes", b.len()),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Dictionary(d) => {
                write!(f, "{{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Structure(s) => write!(f, "Structure({:#04x}, {} fields)", s.tag, s.fields.len()),
        }
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Value {
                Value::Integer(v as i64)
            }
        })*
    };
}
impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Value {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Value {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Dictionary> for Value {
    fn from(v: Dictionary) -> Value {
        Value::Dictionary(v)
    }
}

impl From<Structure> for Value {
    fn from(v: Structure) -> Value {
        Value::Structure(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_insert_overwrites_same_key() {
        let mut d = Dictionary::new();
        d.insert("a", 1);
        d.insert("a", 2);
        assert_eq!(d.len(), 1);
        assert_eq!(d.get("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn dictionary_equality_ignores_order() {
        let mut a = Dictionary::new();
        a.insert("x", 1).insert("y", 2);
        let mut b = Dictionary::new();
        b.insert("y", 2).insert("x", 1);
        assert_eq!(Value::Dictionary(a), Value::Dictionary(b));
    }

    #[test]
    fn unsupported_construction_is_a_type_error_not_a_panic() {
        let v = Value::Integer(1);
        assert!(v.as_str().is_err());
    }
}
