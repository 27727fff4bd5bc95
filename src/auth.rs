//! Authentication schemes (§6): the fields a `HELLO`/`LOGON` pair needs
//! for each of the well-known `scheme` strings.

/// Credentials for one connection. `scheme` drives which of `principal`/
/// `credentials`/`realm` the server expects to be present; `extra`
/// carries provider-defined keys for a `custom` scheme.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub scheme: String,
    pub principal: Option<String>,
    pub credentials: Option<String>,
    pub realm: Option<String>,
}

impl AuthConfig {
    pub fn none() -> AuthConfig {
        AuthConfig { scheme: "none".into(), principal: None, credentials: None, realm: None }
    }

    pub fn basic(principal: impl Into<String>, credentials: impl Into<String>) -> AuthConfig {
        AuthConfig {
            scheme: "basic".into(),
            principal: Some(principal.into()),
            credentials: Some(credentials.into()),
            realm: None,
        }
    }

    pub fn basic_with_realm(principal: impl Into<String>, credentials: impl Into<String>, realm: impl Into<String>) -> AuthConfig {
        let mut config = AuthConfig::basic(principal, credentials);
        config.realm = Some(realm.into());
        config
    }

    pub fn bearer(token: impl Into<String>) -> AuthConfig {
        AuthConfig { scheme: "bearer".into(), principal: None, credentials: Some(token.into()), realm: None }
    }

    pub fn kerberos(principal: impl Into<String>, ticket: impl Into<String>) -> AuthConfig {
        AuthConfig {
            scheme: "kerberos".into(),
            principal: Some(principal.into()),
            credentials: Some(ticket.into()),
            realm: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_carries_principal_and_credentials() {
        let auth = AuthConfig::basic("neo4j", "s3cret");
        assert_eq!(auth.scheme, "basic");
        assert_eq!(auth.principal.as_deref(), Some("neo4j"));
        assert_eq!(auth.credentials.as_deref(), Some("s3cret"));
        assert_eq!(auth.realm, None);
    }

    #[test]
    fn none_scheme_carries_no_fields() {
        let auth = AuthConfig::none();
        assert!(auth.principal.is_none());
        assert!(auth.credentials.is_none());
    }
}
