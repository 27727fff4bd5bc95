//! The connection pool (§4.7, §5): a bounded set of idle/in-use
//! connections to a single endpoint, with FIFO-fair acquisition.
//!
//! There is no bundled pool crate in this driver's dependency stack (the
//! teacher doesn't carry one either), so this is hand-built in the
//! teacher's async idiom: shared state behind a mutex, waiters woken
//! explicitly rather than polled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, Semaphore};

use crate::auth::AuthConfig;
use crate::config::Config;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::packstream::Registry;
use crate::transport::TransportConfig;

struct IdleEntry {
    conn: Connection,
    permit: OwnedSemaphorePermit,
}

struct Inner {
    config: Config,
    auth: AuthConfig,
    registry: Registry,
    idle: Mutex<VecDeque<IdleEntry>>,
    /// Total capacity: one permit per connection that exists, idle or
    /// in-use. Freed only when a connection is well and truly discarded,
    /// never by a return-to-idle (§4.7 pool bounds: `in_use + idle <= max_size`).
    semaphore: Arc<Semaphore>,
    /// Woken whenever an idle connection becomes available or a permit
    /// is freed by a discard — either can satisfy a blocked `acquire`.
    waiters: Mutex<VecDeque<Arc<Notify>>>,
    closed: AtomicBool,
}

/// A bounded pool of connections to one Bolt endpoint.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

/// A connection checked out of the pool. Must be returned via
/// [`Pool::release`] — there is no `Drop`-based auto-return, so a
/// caller that forgets to release leaks the slot until the pool itself
/// is closed (the session layer always releases in a `finally`-style
/// path).
pub struct PooledConnection {
    conn: Option<Connection>,
    permit: Option<OwnedSemaphorePermit>,
}

impl PooledConnection {
    pub fn get(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken")
    }

    pub fn get_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection taken")
    }
}

impl Pool {
    pub fn new(config: Config) -> Pool {
        let auth = config.auth.clone();
        let max_size = config.max_size;
        Pool {
            inner: Arc::new(Inner {
                config,
                auth,
                registry: Registry::with_defaults(),
                idle: Mutex::new(VecDeque::new()),
                semaphore: Arc::new(Semaphore::new(max_size)),
                waiters: Mutex::new(VecDeque::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            host: self.inner.config.uri.host.clone(),
            port: self.inner.config.uri.port,
            encrypted: self.inner.config.encrypted(),
            trust: self.inner.config.effective_trust(),
            connect_timeout: self.inner.config.connect_timeout,
        }
    }

    /// Acquires a connection: reuses a healthy idle one, creates a new
    /// one if under `max_size`, or waits up to `acquire_timeout` for a
    /// release (§4.7).
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self) -> Result<PooledConnection> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }
        let deadline = Instant::now() + self.inner.config.acquire_timeout;

        loop {
            if let Some(entry) = self.take_healthy_idle().await {
                return Ok(PooledConnection { conn: Some(entry.conn), permit: Some(entry.permit) });
            }

            if let Ok(permit) = self.inner.semaphore.clone().try_acquire_owned() {
                match self.create(permit).await {
                    Ok(pooled) => return Ok(pooled),
                    Err(e) => return Err(e),
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::PoolExhausted(self.inner.config.acquire_timeout));
            }
            if self.wait_for_signal(deadline - now).await.is_err() {
                return Err(Error::PoolExhausted(self.inner.config.acquire_timeout));
            }
        }
    }

    async fn take_healthy_idle(&self) -> Option<IdleEntry> {
        let mut idle = self.inner.idle.lock().await;
        while let Some(entry) = idle.pop_front() {
            if entry.conn.is_defunct() {
                continue; // permit drops here, freeing the slot
            }
            if entry.conn.last_used().elapsed() > self.inner.config.max_idle {
                continue;
            }
            return Some(entry);
        }
        None
    }

    async fn create(&self, permit: OwnedSemaphorePermit) -> Result<PooledConnection> {
        let transport_config = self.transport_config();
        let conn = Connection::establish(
            &transport_config,
            &self.inner.auth,
            &self.inner.config.user_agent,
            self.inner.config.handshake_timeout,
            self.inner.registry.clone(),
            self.inner.config.routing_context(),
        )
        .await;
        match conn {
            Ok(conn) => Ok(PooledConnection { conn: Some(conn), permit: Some(permit) }),
            Err(e) => {
                drop(permit); // slot returns to the semaphore; a waiter may proceed
                self.wake_one().await;
                Err(e)
            }
        }
    }

    async fn wait_for_signal(&self, timeout: Duration) -> Result<()> {
        let notify = Arc::new(Notify::new());
        self.inner.waiters.lock().await.push_back(notify.clone());
        match tokio::time::timeout(timeout, notify.notified()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let mut waiters = self.inner.waiters.lock().await;
                waiters.retain(|w| !Arc::ptr_eq(w, &notify));
                Err(Error::PoolExhausted(timeout))
            }
        }
    }

    async fn wake_one(&self) {
        if let Some(notify) = self.inner.waiters.lock().await.pop_front() {
            notify.notify_one();
        }
    }

    /// Returns a checked-out connection. `READY`/`TX_READY` connections
    /// go back to idle; `FAILED`/`INTERRUPTED` ones are reset first;
    /// anything that can't be recovered is discarded and the slot freed
    /// (§4.7).
    #[tracing::instrument(skip(self, pooled))]
    pub async fn release(&self, mut pooled: PooledConnection) {
        use crate::state::ConnectionState;

        let mut conn = pooled.conn.take().expect("connection already released");
        let permit = pooled.permit.take().expect("permit already released");

        let recovered = match conn.state() {
            ConnectionState::Ready | ConnectionState::TxReady => true,
            ConnectionState::Failed | ConnectionState::Interrupted => conn.reset().await.is_ok(),
            _ => false,
        };

        if recovered && !self.inner.closed.load(Ordering::Acquire) {
            self.inner.idle.lock().await.push_back(IdleEntry { conn, permit });
            self.wake_one().await;
        } else {
            conn.close().await;
            drop(permit);
            self.wake_one().await;
        }
    }

    /// Prevents new acquisitions, closes every connection (idle and any
    /// still checked out once they're released), and wakes every
    /// waiter with `PoolClosed` (§4.7).
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let mut idle = self.inner.idle.lock().await;
        while let Some(entry) = idle.pop_front() {
            let mut entry = entry;
            entry.conn.close().await;
        }
        let mut waiters = self.inner.waiters.lock().await;
        while let Some(notify) = waiters.pop_front() {
            notify.notify_one();
        }
    }

    pub async fn idle_count(&self) -> usize {
        self.inner.idle.lock().await.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.inner.config.max_size - self.inner.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_bounds_hold_for_available_permits() {
        let config = Config::builder("bolt://localhost").unwrap().max_size(5).build();
        let pool = Pool::new(config);
        assert_eq!(pool.inner.semaphore.available_permits(), 5);
        assert_eq!(pool.in_use_count(), 0);
    }
}
