use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::graph::GraphValue;
use crate::value::Value;

type Factory = Arc<dyn Fn(&[Value]) -> Result<GraphValue> + Send + Sync>;

/// Maps a Structure tag byte to a factory producing a graph-domain value
/// from its raw field list (§4.2). Registration is idempotent per tag
/// (last writer wins); an unregistered tag is simply left as a generic
/// `Value::Structure` by whoever is inspecting it rather than failing
/// the decode.
///
/// A process-wide singleton would work equally well here, but an
/// explicit, cloneable registry avoids global mutable state and lets a
/// caller run two differently-configured connections in one process
/// (§9 design notes).
#[derive(Clone, Default)]
pub struct Registry {
    factories: HashMap<u8, Factory>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { factories: HashMap::new() }
    }

    /// A registry with the standard graph-value tags registered: Node,
    /// Relationship, UnboundRelationship, Path, and the temporal/spatial
    /// structures (§4.3).
    pub fn with_defaults() -> Self {
        let mut registry = Registry::new();
        crate::graph::register_defaults(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, tag: u8, factory: F)
    where
        F: Fn(&[Value]) -> Result<GraphValue> + Send + Sync + 'static,
    {
        self.factories.insert(tag, Arc::new(factory));
    }

    pub fn is_registered(&self, tag: u8) -> bool {
        self.factories.contains_key(&tag)
    }

    /// Builds a `GraphValue` for a decoded structure if its tag is
    /// registered. Returns `None` for unknown tags; the caller keeps the
    /// generic `Value::Structure` in that case.
    pub fn build(&self, tag: u8, fields: &[Value]) -> Option<Result<GraphValue>> {
        self.factories.get(&tag).map(|factory| factory(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_tag_yields_none() {
        let registry = Registry::new();
        assert!(registry.build(0x4E, &[]).is_none());
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = Registry::new();
        registry.register(0x01, |_| Ok(GraphValue::Structure(crate::value::Structure::new(0x01, vec![]).unwrap())));
        registry.register(0x01, |_| Ok(GraphValue::Structure(crate::value::Structure::new(0x01, vec![Value::Null]).unwrap())));
        let built = registry.build(0x01, &[]).unwrap().unwrap();
        match built {
            GraphValue::Structure(s) => assert_eq!(s.fields.len(), 1),
            _ => panic!("expected structure"),
        }
    }
}
