//! Connection URI parsing (§6): `<scheme>://<host>[:<port>][/<database>][?k=v&...]`.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::transport::TrustMode;

pub const DEFAULT_PORT: u16 = 7687;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    Direct,
    Routing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Bolt,
    BoltS,
    BoltSsc,
    Neo4j,
    Neo4jS,
    Neo4jSsc,
}

impl Scheme {
    pub fn parse(s: &str) -> Result<Scheme> {
        match s {
            "bolt" => Ok(Scheme::Bolt),
            "bolt+s" => Ok(Scheme::BoltS),
            "bolt+ssc" => Ok(Scheme::BoltSsc),
            "neo4j" => Ok(Scheme::Neo4j),
            "neo4j+s" => Ok(Scheme::Neo4jS),
            "neo4j+ssc" => Ok(Scheme::Neo4jSsc),
            other => Err(Error::UnsupportedScheme(other.to_owned())),
        }
    }

    pub fn routing(&self) -> Routing {
        match self {
            Scheme::Bolt | Scheme::BoltS | Scheme::BoltSsc => Routing::Direct,
            Scheme::Neo4j | Scheme::Neo4jS | Scheme::Neo4jSsc => Routing::Routing,
        }
    }

    pub fn encrypted(&self) -> bool {
        !matches!(self, Scheme::Bolt | Scheme::Neo4j)
    }

    /// The certificate trust policy implied purely by the scheme, before
    /// any programmatic override (§6). `system`/`allow_any`/etc.
    pub fn default_trust(&self) -> TrustMode {
        match self {
            Scheme::Bolt | Scheme::Neo4j => TrustMode::System, // unused: not encrypted
            Scheme::BoltS | Scheme::Neo4jS => TrustMode::System,
            Scheme::BoltSsc | Scheme::Neo4jSsc => TrustMode::AllowAny,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionUri {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub query: HashMap<String, String>,
}

impl ConnectionUri {
    pub fn parse(uri: &str) -> Result<ConnectionUri> {
        let parsed = url::Url::parse(uri).map_err(|e| Error::InvalidUri(format!("{uri}: {e}")))?;
        let scheme = Scheme::parse(parsed.scheme())?;
        let host = parsed.host_str().ok_or_else(|| Error::InvalidUri(format!("{uri}: missing host")))?.to_owned();
        let port = parsed.port().unwrap_or(DEFAULT_PORT);

        let database = match parsed.path().trim_matches('/') {
            "" => None,
            db => {
                validate_database_name(db)?;
                Some(db.to_owned())
            }
        };

        let query = parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

        Ok(ConnectionUri { scheme, host, port, database, query })
    }
}

/// Database name rules (§6): 3..63 chars, starts with a letter, chars in
/// `[a-zA-Z0-9._-]`, no trailing `.`/`-`, no `..`.
pub fn validate_database_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidUri(format!("invalid database name {name:?}: {reason}"));

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be 3-63 characters"));
    }
    let first = name.chars().next().unwrap();
    if !first.is_ascii_alphabetic() {
        return Err(invalid("must start with a letter"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-') {
        return Err(invalid("must contain only letters, digits, '.', '_', '-'"));
    }
    if name.ends_with('.') || name.ends_with('-') {
        return Err(invalid("must not end with '.' or '-'"));
    }
    if name.contains("..") {
        return Err(invalid("must not contain '..'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_host_port_database() {
        let uri = ConnectionUri::parse("neo4j+s://graph.example.com:7688/neo4j").unwrap();
        assert_eq!(uri.scheme, Scheme::Neo4jS);
        assert_eq!(uri.host, "graph.example.com");
        assert_eq!(uri.port, 7688);
        assert_eq!(uri.database.as_deref(), Some("neo4j"));
    }

    #[test]
    fn defaults_port_when_absent() {
        let uri = ConnectionUri::parse("bolt://localhost").unwrap();
        assert_eq!(uri.port, DEFAULT_PORT);
        assert_eq!(uri.database, None);
    }

    #[test]
    fn bolt_ssc_is_encrypted_but_trusts_self_signed() {
        assert!(Scheme::BoltSsc.encrypted());
        assert!(matches!(Scheme::BoltSsc.default_trust(), TrustMode::AllowAny));
    }

    #[test]
    fn bolt_is_unencrypted_direct() {
        assert!(!Scheme::Bolt.encrypted());
        assert_eq!(Scheme::Bolt.routing(), Routing::Direct);
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert!(matches!(ConnectionUri::parse("http://localhost"), Err(Error::UnsupportedScheme(_))));
    }

    #[test]
    fn database_name_rules() {
        assert!(validate_database_name("ab").is_err()); // too short
        assert!(validate_database_name("1abc").is_err()); // doesn't start with letter
        assert!(validate_database_name("abc.").is_err()); // trailing dot
        assert!(validate_database_name("abc-").is_err()); // trailing dash
        assert!(validate_database_name("ab..cd").is_err()); // double dot
        assert!(validate_database_name("neo4j").is_ok());
        assert!(validate_database_name("my_graph-01").is_ok());
    }
}
