//! Driver configuration (§6, §4.7): parsed from a Bolt URI plus
//! programmatic overrides for pool sizing, timeouts, and TLS trust.

use std::time::Duration;

use crate::auth::AuthConfig;
use crate::error::Result;
use crate::transport::TrustMode;
use crate::uri::{ConnectionUri, Routing};
use crate::value::Dictionary;

#[derive(Debug, Clone)]
pub struct Config {
    pub uri: ConnectionUri,
    pub auth: AuthConfig,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub max_size: usize,
    pub min_size: usize,
    pub max_idle: Duration,
    pub acquire_timeout: Duration,
    pub max_transaction_retry_time: Duration,
    pub trust: Option<TrustMode>,
}

impl Config {
    pub fn builder(uri: &str) -> Result<ConfigBuilder> {
        Ok(ConfigBuilder { config: Config::from_uri(uri)? })
    }

    fn from_uri(uri: &str) -> Result<Config> {
        let uri = ConnectionUri::parse(uri)?;
        Ok(Config {
            uri,
            auth: AuthConfig::none(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
            max_size: 100,
            min_size: 1,
            max_idle: Duration::from_secs(3600),
            acquire_timeout: Duration::from_secs(60),
            max_transaction_retry_time: Duration::from_secs(30),
            trust: None,
        })
    }

    /// The trust mode actually in effect: a programmatic override if one
    /// was set, otherwise the scheme's default (§6).
    pub fn effective_trust(&self) -> TrustMode {
        self.trust.clone().unwrap_or_else(|| self.uri.scheme.default_trust())
    }

    pub fn encrypted(&self) -> bool {
        self.uri.scheme.encrypted()
    }

    /// The `routing` HELLO field (§6's SPEC_FULL supplement): the URI's
    /// query parameters, forwarded verbatim, for `neo4j(+s|+ssc)`
    /// schemes. Routing-table resolution itself is out of scope (spec.md
    /// §1 Non-goals) — a routing URI still resolves to one direct
    /// connection against the given host; this only carries the context
    /// a real router would need, for forward compatibility.
    pub fn routing_context(&self) -> Option<Dictionary> {
        if self.uri.scheme.routing() != Routing::Routing || self.uri.query.is_empty() {
            return None;
        }
        let mut dict = Dictionary::with_capacity(self.uri.query.len() + 1);
        dict.insert("address", format!("{}:{}", self.uri.host, self.uri.port));
        for (k, v) in &self.uri.query {
            dict.insert(k.as_str(), v.as_str());
        }
        Some(dict)
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn min_size(mut self, min_size: usize) -> Self {
        self.config.min_size = min_size;
        self
    }

    pub fn max_idle(mut self, max_idle: Duration) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    pub fn max_transaction_retry_time(mut self, duration: Duration) -> Self {
        self.config.max_transaction_retry_time = duration;
        self
    }

    pub fn trust(mut self, trust: TrustMode) -> Self {
        self.config.trust = Some(trust);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_spec_pool_defaults() {
        let config = Config::builder("bolt://localhost").unwrap().build();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.min_size, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(60));
    }

    #[test]
    fn explicit_trust_overrides_scheme_default() {
        let config = Config::builder("bolt+s://localhost").unwrap().trust(TrustMode::AllowAny).build();
        assert!(matches!(config.effective_trust(), TrustMode::AllowAny));
    }

    #[test]
    fn user_agent_defaults_to_crate_name_and_version() {
        let config = Config::builder("bolt://localhost").unwrap().build();
        assert!(config.user_agent.starts_with("bolt-driver/"));
    }

    #[test]
    fn routing_context_is_none_for_direct_schemes() {
        let config = Config::builder("bolt://localhost?region=eu").unwrap().build();
        assert!(config.routing_context().is_none());
    }

    #[test]
    fn routing_context_carries_query_params_for_routing_schemes() {
        let config = Config::builder("neo4j://localhost:7687?region=eu").unwrap().build();
        let routing = config.routing_context().unwrap();
        assert_eq!(routing.get("region"), Some(&crate::value::Value::String("eu".into())));
        assert_eq!(routing.get("address"), Some(&crate::value::Value::String("localhost:7687".into())));
    }

    #[test]
    fn routing_context_is_none_without_query_params() {
        let config = Config::builder("neo4j://localhost").unwrap().build();
        assert!(config.routing_context().is_none());
    }
}
