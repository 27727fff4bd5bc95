//! Thin adapters over the graph-value structures the codec must
//! recognize (§4.3). These are not where the hard engineering of this
//! crate lives — they exist so a `RECORD` field decoded as
//! `Value::Structure` can be turned into something a caller can read
//! without re-deriving the tag table by hand.

use crate::error::{Error, Result};
use crate::packstream::Registry;
use crate::value::{Dictionary, Value};

pub mod tag {
    pub const NODE: u8 = 0x4E;
    pub const RELATIONSHIP: u8 = 0x52;
    pub const UNBOUND_RELATIONSHIP: u8 = 0x72;
    pub const PATH: u8 = 0x50;
    pub const DATE: u8 = 0x44;
    pub const TIME: u8 = 0x54;
    pub const LOCAL_TIME: u8 = 0x74;
    pub const DATE_TIME: u8 = 0x49;
    pub const DATE_TIME_ZONE_ID: u8 = 0x69;
    pub const LOCAL_DATE_TIME: u8 = 0x64;
    pub const LEGACY_DATE_TIME: u8 = 0x46;
    pub const LEGACY_DATE_TIME_ZONE_ID: u8 = 0x66;
    pub const DURATION: u8 = 0x45;
    pub const POINT_2D: u8 = 0x58;
    pub const POINT_3D: u8 = 0x59;
}

/// The closed set of graph-domain values the registry knows how to
/// build. Anything decoded with an unregistered tag stays a generic
/// `Value::Structure` instead (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Node(Node),
    Relationship(Relationship),
    UnboundRelationship(UnboundRelationship),
    Path(Path),
    Date(Date),
    Time(Time),
    LocalTime(LocalTime),
    DateTime(DateTime),
    DateTimeZoneId(DateTimeZoneId),
    LocalDateTime(LocalDateTime),
    LegacyDateTime(LegacyDateTime),
    LegacyDateTimeZoneId(LegacyDateTimeZoneId),
    Duration(Duration),
    Point2D(Point2D),
    Point3D(Point3D),
    /// Escape hatch: a registered tag whose factory chose not to
    /// specialize (kept for symmetry with the packstream-level fallback).
    Structure(crate::value::Structure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: Dictionary,
    /// Stable string identity, present from protocol version 5.0 (§4.3, §9).
    pub element_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: i64,
    pub start_id: i64,
    pub end_id: i64,
    pub rel_type: String,
    pub properties: Dictionary,
    pub element_id: Option<String>,
    pub start_element_id: Option<String>,
    pub end_element_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnboundRelationship {
    pub id: i64,
    pub rel_type: String,
    pub properties: Dictionary,
    pub element_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub rels: Vec<UnboundRelationship>,
    /// Alternating 1-based (rel, node) index pairs; negative rel index
    /// means the relationship is traversed in reverse.
    pub indices: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Date {
    pub days_since_epoch: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Time {
    pub nanos_since_midnight: i64,
    pub tz_offset_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTime {
    pub nanos_since_midnight: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateTime {
    pub seconds: i64,
    pub nanos: i64,
    pub tz_offset_seconds: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateTimeZoneId {
    pub seconds: i64,
    pub nanos: i64,
    pub tz_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalDateTime {
    pub seconds: i64,
    pub nanos: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyDateTime {
    pub seconds: i64,
    pub nanos: i64,
    pub tz_offset_seconds: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyDateTimeZoneId {
    pub seconds: i64,
    pub nanos: i64,
    pub tz_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Duration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub srid: i64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3D {
    pub srid: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

fn int(fields: &[Value], i: usize) -> Result<i64> {
    fields.get(i).ok_or_else(|| missing(i)).and_then(Value::as_integer)
}

fn float(fields: &[Value], i: usize) -> Result<f64> {
    fields.get(i).ok_or_else(|| missing(i)).and_then(Value::as_float)
}

fn string(fields: &[Value], i: usize) -> Result<String> {
    fields.get(i).ok_or_else(|| missing(i)).and_then(Value::as_str).map(str::to_owned)
}

fn string_list(fields: &[Value], i: usize) -> Result<Vec<String>> {
    fields
        .get(i)
        .ok_or_else(|| missing(i))
        .and_then(Value::as_list)?
        .iter()
        .map(|v| v.as_str().map(str::to_owned))
        .collect()
}

fn dict(fields: &[Value], i: usize) -> Result<Dictionary> {
    fields.get(i).ok_or_else(|| missing(i)).and_then(Value::as_dict).cloned()
}

fn opt_string(fields: &[Value], i: usize) -> Option<String> {
    fields.get(i).and_then(|v| v.as_str().ok()).map(str::to_owned)
}

fn missing(i: usize) -> Error {
    Error::InvalidMessage(format!("missing structure field {i}"))
}

/// Registers the standard graph-value factories (§4.3). Element-ID fields
/// are version-dependent (present from 5.0): factories branch on the
/// observed field count rather than the negotiated protocol version,
/// since a single connection never mixes the two shapes in practice
/// (§9 open question — resolved in DESIGN.md).
pub fn register_defaults(registry: &mut Registry) {
    registry.register(tag::NODE, |f| {
        Ok(GraphValue::Node(Node {
            id: int(f, 0)?,
            labels: string_list(f, 1)?,
            properties: dict(f, 2)?,
            element_id: opt_string(f, 3),
        }))
    });

    registry.register(tag::RELATIONSHIP, |f| {
        Ok(GraphValue::Relationship(Relationship {
            id: int(f, 0)?,
            start_id: int(f, 1)?,
            end_id: int(f, 2)?,
            rel_type: string(f, 3)?,
            properties: dict(f, 4)?,
            element_id: opt_string(f, 5),
            start_element_id: opt_string(f, 6),
            end_element_id: opt_string(f, 7),
        }))
    });

    registry.register(tag::UNBOUND_RELATIONSHIP, |f| {
        Ok(GraphValue::UnboundRelationship(UnboundRelationship {
            id: int(f, 0)?,
            rel_type: string(f, 1)?,
            properties: dict(f, 2)?,
            element_id: opt_string(f, 3),
        }))
    });

    registry.register(tag::PATH, |f| {
        let nodes = f.get(0).ok_or_else(|| missing(0))?.as_list()?;
        let rels = f.get(1).ok_or_else(|| missing(1))?.as_list()?;
        let indices = f.get(2).ok_or_else(|| missing(2))?.as_list()?;
        let nodes = nodes
            .iter()
            .map(|v| match v.as_structure()?.tag {
                tag::NODE => match node_from_fields(&v.as_structure()?.fields)? {
                    GraphValue::Node(n) => Ok(n),
                    _ => unreachable!(),
                },
                other => Err(Error::InvalidMessage(format!("path node has unexpected tag {other:#04x}"))),
            })
            .collect::<Result<Vec<_>>>()?;
        let rels = rels
            .iter()
            .map(|v| match v.as_structure()?.tag {
                tag::UNBOUND_RELATIONSHIP => match unbound_rel_from_fields(&v.as_structure()?.fields)? {
                    GraphValue::UnboundRelationship(r) => Ok(r),
                    _ => unreachable!(),
                },
                other => Err(Error::InvalidMessage(format!("path relationship has unexpected tag {other:#04x}"))),
            })
            .collect::<Result<Vec<_>>>()?;
        let indices = indices.iter().map(Value::as_integer).collect::<Result<Vec<_>>>()?;
        Ok(GraphValue::Path(Path { nodes, rels, indices }))
    });

    registry.register(tag::DATE, |f| Ok(GraphValue::Date(Date { days_since_epoch: int(f, 0)? })));

    registry.register(tag::TIME, |f| {
        Ok(GraphValue::Time(Time { nanos_since_midnight: int(f, 0)?, tz_offset_seconds: int(f, 1)? }))
    });

    registry.register(tag::LOCAL_TIME, |f| Ok(GraphValue::LocalTime(LocalTime { nanos_since_midnight: int(f, 0)? })));

    registry.register(tag::DATE_TIME, |f| {
        Ok(GraphValue::DateTime(DateTime { seconds: int(f, 0)?, nanos: int(f, 1)?, tz_offset_seconds: int(f, 2)? }))
    });

    registry.register(tag::DATE_TIME_ZONE_ID, |f| {
        Ok(GraphValue::DateTimeZoneId(DateTimeZoneId { seconds: int(f, 0)?, nanos: int(f, 1)?, tz_id: string(f, 2)? }))
    });

    registry.register(tag::LOCAL_DATE_TIME, |f| {
        Ok(GraphValue::LocalDateTime(LocalDateTime { seconds: int(f, 0)?, nanos: int(f, 1)? }))
    });

    registry.register(tag::LEGACY_DATE_TIME, |f| {
        Ok(GraphValue::LegacyDateTime(LegacyDateTime {
            seconds: int(f, 0)?,
            nanos: int(f, 1)?,
            tz_offset_seconds: int(f, 2)?,
        }))
    });

    registry.register(tag::LEGACY_DATE_TIME_ZONE_ID, |f| {
        Ok(GraphValue::LegacyDateTimeZoneId(LegacyDateTimeZoneId {
            seconds: int(f, 0)?,
            nanos: int(f, 1)?,
            tz_id: string(f, 2)?,
        }))
    });

    registry.register(tag::DURATION, |f| {
        Ok(GraphValue::Duration(Duration { months: int(f, 0)?, days: int(f, 1)?, seconds: int(f, 2)?, nanos: int(f, 3)? }))
    });

    registry.register(tag::POINT_2D, |f| {
        Ok(GraphValue::Point2D(Point2D { srid: int(f, 0)?, x: float(f, 1)?, y: float(f, 2)? }))
    });

    registry.register(tag::POINT_3D, |f| {
        Ok(GraphValue::Point3D(Point3D { srid: int(f, 0)?, x: float(f, 1)?, y: float(f, 2)?, z: float(f, 3)? }))
    });
}

fn node_from_fields(fields: &[Value]) -> Result<GraphValue> {
    Ok(GraphValue::Node(Node {
        id: int(fields, 0)?,
        labels: string_list(fields, 1)?,
        properties: dict(fields, 2)?,
        element_id: opt_string(fields, 3),
    }))
}

fn unbound_rel_from_fields(fields: &[Value]) -> Result<GraphValue> {
    Ok(GraphValue::UnboundRelationship(UnboundRelationship {
        id: int(fields, 0)?,
        rel_type: string(fields, 1)?,
        properties: dict(fields, 2)?,
        element_id: opt_string(fields, 3),
    }))
}

/// Interprets a decoded `Value` as a graph value if its tag is
/// registered. Values that aren't structures, or whose tag isn't
/// registered, pass through unchanged for the caller to handle as a
/// generic `Value`.
pub fn interpret(value: &Value, registry: &Registry) -> Result<Option<GraphValue>> {
    match value {
        Value::Structure(s) => registry.build(s.tag, &s.fields).transpose(),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Structure;

    #[test]
    fn node_factory_reads_element_id_when_present() {
        let registry = Registry::with_defaults();
        let mut props = Dictionary::new();
        props.insert("name", "Alice");
        let fields = vec![
            Value::Integer(1),
            Value::List(vec![Value::String("Person".into())]),
            Value::Dictionary(props),
            Value::String("4:abc:1".into()),
        ];
        let built = registry.build(tag::NODE, &fields).unwrap().unwrap();
        match built {
            GraphValue::Node(n) => {
                assert_eq!(n.id, 1);
                assert_eq!(n.labels, vec!["Person".to_string()]);
                assert_eq!(n.element_id.as_deref(), Some("4:abc:1"));
            }
            _ => panic!("expected node"),
        }
    }

    #[test]
    fn node_factory_without_element_id_defaults_to_none() {
        let registry = Registry::with_defaults();
        let fields = vec![Value::Integer(1), Value::List(vec![]), Value::Dictionary(Dictionary::new())];
        let built = registry.build(tag::NODE, &fields).unwrap().unwrap();
        match built {
            GraphValue::Node(n) => assert_eq!(n.element_id, None),
            _ => panic!("expected node"),
        }
    }

    #[test]
    fn unknown_tag_is_not_registered() {
        let registry = Registry::with_defaults();
        assert!(registry.build(0x01, &[]).is_none());
        let _ = Structure::new(0x01, vec![]).unwrap();
    }
}
