//! A Bolt protocol graph-database driver: PackStream codec, chunked
//! framing, the connection-level state machine, and a pooled driver
//! runtime on top (sessions, transactions, streamed results).
//!
//! ```no_run
//! # async fn run() -> bolt_driver::error::Result<()> {
//! use bolt_driver::{Driver, auth::AuthConfig};
//!
//! let driver = Driver::connect("bolt://localhost:7687", AuthConfig::basic("neo4j", "password"))?;
//! let mut session = driver.session(Default::default());
//! let mut result = session.run("RETURN 1 AS n", Default::default()).await?;
//! while let Some(record) = result.next().await? {
//!     println!("{:?}", record);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod chunk;
pub mod config;
pub mod connection;
pub mod error;
pub mod graph;
pub mod handshake;
pub mod message;
pub mod packstream;
pub mod pool;
pub mod session;
pub mod state;
pub mod transport;
pub mod uri;
pub mod value;

use config::{Config, ConfigBuilder};
use error::Result;
use pool::Pool;
use session::{Session, SessionConfig};

/// The top-level entry point: a `Config` bound to a live connection
/// pool. Cheap to clone — clones share the same pool (§4.7).
#[derive(Clone)]
pub struct Driver {
    pool: Pool,
    max_transaction_retry_time: std::time::Duration,
}

impl Driver {
    /// Parses `uri` and builds a driver with the given credentials and
    /// otherwise-default configuration (§6).
    pub fn connect(uri: &str, auth: auth::AuthConfig) -> Result<Driver> {
        let config = Config::builder(uri)?.auth(auth).build();
        Ok(Driver::with_config(config))
    }

    /// Entry point for callers that need pool sizing, timeouts, or TLS
    /// trust overrides beyond the URI's defaults.
    pub fn builder(uri: &str) -> Result<ConfigBuilder> {
        Config::builder(uri)
    }

    pub fn with_config(config: Config) -> Driver {
        let max_transaction_retry_time = config.max_transaction_retry_time;
        Driver { pool: Pool::new(config), max_transaction_retry_time }
    }

    /// Opens a new session. Sessions are cheap and meant to be
    /// short-lived: one per unit of work, not held across requests.
    pub fn session(&self, config: SessionConfig) -> Session {
        Session::new(self.pool.clone(), config, self.max_transaction_retry_time)
    }

    /// Closes the underlying pool: in-flight `acquire`s fail with
    /// `PoolClosed`, idle connections are closed immediately, and
    /// checked-out connections are closed as they're released.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_rejects_unsupported_scheme() {
        assert!(Driver::connect("http://localhost", auth::AuthConfig::none()).is_err());
    }

    #[test]
    fn with_config_carries_pool_sizing() {
        let config = Config::builder("bolt://localhost").unwrap().max_size(3).build();
        let driver = Driver::with_config(config);
        assert_eq!(driver.pool.in_use_count(), 0);
    }
}
