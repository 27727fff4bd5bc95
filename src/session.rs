//! Sessions, transactions, and streamed results (§4.8, component I): the
//! surface most callers actually use. A `Session` borrows one connection
//! from the pool for the duration of each piece of work and always
//! returns it, whatever that work's outcome.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::{Classification, Error, Result};
use crate::pool::{Pool, PooledConnection};
use crate::value::{Dictionary, Value};

/// `r` or `w` on the wire (§6's `mode` BEGIN field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    fn wire(&self) -> &'static str {
        match self {
            AccessMode::Read => "r",
            AccessMode::Write => "w",
        }
    }
}

/// Per-session configuration: target database and default access mode,
/// plus the bookmarks to causally chain onto (§4.8's Session data model,
/// §1's Non-goals — bookmark semantics beyond carrying the strings
/// through is out of scope).
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub database: Option<String>,
    pub default_access_mode: Option<AccessMode>,
    pub bookmarks: Vec<String>,
}

/// A borrowed connection plus the bookkeeping `run`/transactions need.
/// Opens lazily on first use and closes when dropped out of scope by the
/// caller calling [`Session::close`] — there is no `Drop`-based release,
/// matching [`PooledConnection`]'s explicit-release contract.
pub struct Session {
    pool: Pool,
    config: SessionConfig,
    conn: Option<PooledConnection>,
    bookmarks: Vec<String>,
    closed: bool,
    retry_budget: Duration,
}

impl Session {
    pub(crate) fn new(pool: Pool, config: SessionConfig, retry_budget: Duration) -> Session {
        let bookmarks = config.bookmarks.clone();
        Session { pool, config, conn: None, bookmarks, closed: false, retry_budget }
    }

    pub fn last_bookmarks(&self) -> &[String] {
        &self.bookmarks
    }

    async fn ensure_connection(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        if self.conn.is_none() {
            self.conn = Some(self.pool.acquire().await?);
        }
        Ok(())
    }

    fn run_extra(&self, mode: AccessMode) -> Dictionary {
        let mut extra = Dictionary::new();
        if let Some(db) = &self.config.database {
            extra.insert("db", db.as_str());
        }
        extra.insert("mode", mode.wire());
        if !self.bookmarks.is_empty() {
            extra.insert("bookmarks", self.bookmarks.clone());
        }
        extra
    }

    /// Auto-commit `run` (§4.8): acquires a connection if needed, sends
    /// `RUN` + an all-records `PULL`, and returns a [`QueryResult`] the
    /// caller streams records from. On `FAILURE` the connection is reset
    /// before being released, so a failed query never poisons the pool.
    pub async fn run(&mut self, query: &str, parameters: Dictionary) -> Result<QueryResult<'_>> {
        self.ensure_connection().await?;
        let mode = self.config.default_access_mode.unwrap_or(AccessMode::Write);
        let extra = self.run_extra(mode);
        let conn = self.conn.as_mut().expect("connection ensured above").get_mut();

        let run_metadata = match conn.run(query, parameters, extra).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.release_failed().await;
                return Err(e);
            }
        };
        let keys = match run_metadata.get("fields") {
            Some(Value::List(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(QueryResult { owner: ResultOwner::Session(self), keys, records: Vec::new(), summary: None, exhausted: false, consumed: false })
    }

    /// Begins an explicit transaction. The session's held connection is
    /// moved onto the returned [`Transaction`], which owns it outright
    /// rather than borrowing the session — `COMMIT`/`ROLLBACK` hand the
    /// connection straight back to the pool (§4.8), and the session
    /// acquires a fresh one the next time it needs one. Owning the
    /// connection (instead of holding `&mut Session`) is what lets a
    /// `Transaction` be reused after a managed closure returns: a
    /// borrowed, lifetime-parameterized `Transaction<'a>` would tie that
    /// `'a` to the closure's own call, making a later `commit`/`rollback`
    /// on the same value a second, conflicting borrow of `self`.
    pub async fn begin_transaction(&mut self) -> Result<Transaction> {
        self.ensure_connection().await?;
        let mode = self.config.default_access_mode.unwrap_or(AccessMode::Write);
        let extra = self.run_extra(mode);
        let mut conn = self.conn.take().expect("connection ensured above");
        if let Err(e) = conn.get_mut().begin(extra).await {
            self.pool.release(conn).await;
            return Err(e);
        }
        Ok(Transaction { pool: self.pool.clone(), conn: Some(conn), state: TransactionState::Active })
    }

    /// Runs `work` inside a managed transaction, retrying on
    /// `Classification::Transient` with exponential backoff (100ms ×
    /// attempt, default 3 attempts) bounded by `max_transaction_retry_time`
    /// (§4.8). `work` gets a fresh [`Transaction`] each attempt — it must
    /// not assume partial progress survives a retry.
    ///
    /// `work` returns a boxed, borrow-carrying future rather than a bare
    /// `impl Future`: a closure of the shape `Fn(&mut Transaction) -> Fut`
    /// can never be satisfied when `Fut` itself borrows from that `&mut
    /// Transaction`, since the borrow's lifetime varies per call but
    /// `Fut` would have to be one fixed type. Boxing erases that
    /// lifetime. Callers write `|tx| Box::pin(async move { ... })`.
    pub async fn execute_write<F, T>(&mut self, work: F) -> Result<T>
    where
        F: for<'c> Fn(&'c mut Transaction) -> Pin<Box<dyn Future<Output = Result<T>> + 'c>>,
    {
        self.config.default_access_mode = Some(AccessMode::Write);
        self.execute_managed(work).await
    }

    pub async fn execute_read<F, T>(&mut self, work: F) -> Result<T>
    where
        F: for<'c> Fn(&'c mut Transaction) -> Pin<Box<dyn Future<Output = Result<T>> + 'c>>,
    {
        self.config.default_access_mode = Some(AccessMode::Read);
        self.execute_managed(work).await
    }

    async fn execute_managed<F, T>(&mut self, work: F) -> Result<T>
    where
        F: for<'c> Fn(&'c mut Transaction) -> Pin<Box<dyn Future<Output = Result<T>> + 'c>>,
    {
        const MAX_ATTEMPTS: u32 = 3;
        let deadline = tokio::time::Instant::now() + self.pool_retry_budget();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut tx = self.begin_transaction().await?;
            let outcome = work(&mut tx).await;
            match outcome {
                Ok(value) => {
                    tx.commit().await?;
                    return Ok(value);
                }
                Err(e) => {
                    let _ = tx.rollback_on_error().await;
                    let retryable = matches!(&e, Error::DatabaseError { classification: Classification::Transient, .. });
                    if !retryable || attempt >= MAX_ATTEMPTS || tokio::time::Instant::now() >= deadline {
                        return Err(e);
                    }
                    let backoff = Duration::from_millis(100) * attempt;
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    fn pool_retry_budget(&self) -> Duration {
        // Stored on the session at construction time via `Driver::session`;
        // sessions don't otherwise carry a `Config`, so this is threaded
        // through a dedicated field rather than the pool (kept private to
        // `lib.rs`, which constructs sessions with it already resolved).
        self.retry_budget
    }

    async fn release_failed(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn).await;
        }
    }

    /// Returns the held connection to the pool, if any, and marks the
    /// session unusable for further work.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn).await;
        }
    }
}

enum TransactionState {
    Active,
    Closed,
}

/// An explicit transaction that owns the connection it was opened on
/// (§4.8). Unlike [`Session`], it carries no borrow back to whatever
/// created it, so it can be handed to a managed closure and then
/// committed or rolled back afterward without conflicting with that
/// closure's own borrow of it.
pub struct Transaction {
    pool: Pool,
    conn: Option<PooledConnection>,
    state: TransactionState,
}

impl Transaction {
    pub async fn run(&mut self, query: &str, parameters: Dictionary) -> Result<QueryResult<'_>> {
        if !matches!(self.state, TransactionState::Active) {
            return Err(Error::TransactionClosed);
        }
        let conn = self.conn.as_mut().expect("transaction holds a connection").get_mut();
        let run_metadata = conn.run(query, parameters, Dictionary::new()).await?;
        let keys = match run_metadata.get("fields") {
            Some(Value::List(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };
        Ok(QueryResult { owner: ResultOwner::Transaction(self), keys, records: Vec::new(), summary: None, exhausted: false, consumed: false })
    }

    /// Commits and returns the connection to the pool regardless of the
    /// commit's own outcome (§4.8: "COMMIT or ROLLBACK returns connection
    /// to pool").
    pub async fn commit(mut self) -> Result<()> {
        if !matches!(self.state, TransactionState::Active) {
            return Err(Error::TransactionClosed);
        }
        self.state = TransactionState::Closed;
        let mut conn = self.conn.take().expect("transaction holds a connection");
        let result = conn.get_mut().commit().await;
        self.pool.release(conn).await;
        result.map(|_| ())
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.rollback_on_error().await
    }

    async fn rollback_on_error(&mut self) -> Result<()> {
        if !matches!(self.state, TransactionState::Active) {
            return Ok(());
        }
        self.state = TransactionState::Closed;
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let result = conn.get_mut().rollback().await;
        self.pool.release(conn).await;
        result
    }

    async fn release_failed(&mut self) {
        self.state = TransactionState::Closed;
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn).await;
        }
    }
}

/// Either half a [`QueryResult`] can be streaming from: an auto-commit
/// `Session::run` or a `Transaction::run` inside an explicit/managed
/// transaction. Both need the same pull/fail-over logic; this just picks
/// where the connection (and the failure-release path) lives.
enum ResultOwner<'a> {
    Session(&'a mut Session),
    Transaction(&'a mut Transaction),
}

impl<'a> ResultOwner<'a> {
    fn conn_mut(&mut self) -> &mut crate::connection::Connection {
        match self {
            ResultOwner::Session(session) => session.conn.as_mut().expect("session holds a connection while a query result is live").get_mut(),
            ResultOwner::Transaction(tx) => tx.conn.as_mut().expect("transaction holds a connection while a query result is live").get_mut(),
        }
    }

    async fn release_failed(&mut self) {
        match self {
            ResultOwner::Session(session) => session.release_failed().await,
            ResultOwner::Transaction(tx) => tx.release_failed().await,
        }
    }
}

/// A one-shot stream of records plus a future summary (§4.8). Calling
/// [`QueryResult::next`] after the stream is exhausted and the summary
/// already taken returns `ResultConsumed`; [`QueryResult::consume`]
/// drains the rest without buffering.
pub struct QueryResult<'a> {
    owner: ResultOwner<'a>,
    keys: Vec<String>,
    records: Vec<Vec<Value>>,
    summary: Option<Dictionary>,
    exhausted: bool,
    consumed: bool,
}

impl<'a> QueryResult<'a> {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Pulls one record, requesting a batch from the server when the
    /// local buffer is empty. Returns `None` once the summary has been
    /// observed.
    pub async fn next(&mut self) -> Result<Option<Vec<Value>>> {
        if self.consumed {
            return Err(Error::ResultConsumed);
        }
        if let Some(record) = self.pop_buffered() {
            return Ok(Some(record));
        }
        if self.exhausted {
            self.consumed = true;
            return Ok(None);
        }
        self.pull_batch().await?;
        if let Some(record) = self.pop_buffered() {
            return Ok(Some(record));
        }
        self.consumed = true;
        Ok(None)
    }

    fn pop_buffered(&mut self) -> Option<Vec<Value>> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records.remove(0))
        }
    }

    async fn pull_batch(&mut self) -> Result<()> {
        use crate::message::Response;

        let conn = self.owner.conn_mut();
        let mut extra = Dictionary::new();
        extra.insert("n", -1i64); // all records (§4.3's PULL extra)
        conn.send(crate::message::Request::Pull { extra }).await?;
        loop {
            match conn.receive().await? {
                Response::Record(fields) => self.records.push(fields),
                Response::Success(metadata) => {
                    self.summary = Some(metadata);
                    self.exhausted = true;
                    return Ok(());
                }
                Response::Ignored => return Err(Error::ProtocolError("PULL was ignored".into())),
                Response::Failure { code, message, .. } => {
                    self.owner.release_failed().await;
                    return Err(Error::DatabaseError { classification: Classification::from_code(&code), code, message });
                }
            }
        }
    }

    /// The run summary. Only resolves once the record stream has been
    /// fully drained (§4.8's consume-before-summary invariant).
    pub async fn summary(mut self) -> Result<Dictionary> {
        while self.next().await?.is_some() {}
        Ok(self.summary.take().unwrap_or_default())
    }

    /// Drains remaining records without buffering them, then releases
    /// nothing extra — the connection stays with whichever owner holds it.
    pub async fn consume(mut self) -> Result<Dictionary> {
        while !self.exhausted {
            self.records.clear();
            self.pull_batch().await?;
        }
        self.records.clear();
        Ok(self.summary.take().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mode_wire_strings() {
        assert_eq!(AccessMode::Read.wire(), "r");
        assert_eq!(AccessMode::Write.wire(), "w");
    }
}
