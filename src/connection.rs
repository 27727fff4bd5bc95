//! The connection (§4.6, §4.8 component G): pairs a transport with the
//! PackStream codec and the state machine, and is the only thing in
//! this crate that actually writes bytes to a socket.

use std::time::{Duration, Instant};

use asynchronous_codec::{Decoder as _, Encoder as _, Framed};
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::auth::AuthConfig;
use crate::chunk::{ChunkDecoder, ChunkEncoder};
use crate::error::{Error, Result};
use crate::handshake;
use crate::message::{Request, Response};
use crate::packstream;
use crate::state::{ConnectionState, Outcome};
use crate::transport::{self, BoxedStream, TransportConfig};
use crate::value::{Dictionary, Value};

struct FrameCodec {
    decoder: ChunkDecoder,
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec { decoder: ChunkDecoder::default() }
    }
}

impl asynchronous_codec::Encoder for FrameCodec {
    type Item = Bytes;
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        ChunkEncoder.encode(item, dst)
    }
}

impl asynchronous_codec::Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>> {
        self.decoder.decode(src)
    }
}

/// A live connection to one Bolt server. Created already authenticated
/// (§4.6's NEGOTIATION/AUTHENTICATION phases happen inside
/// [`Connection::establish`]); from the caller's perspective a
/// `Connection` always starts life in `READY`.
pub struct Connection {
    framed: Framed<Compat<BoxedStream>, FrameCodec>,
    state: ConnectionState,
    pending: Option<Request>,
    agreed_version: u32,
    pub registry: packstream::Registry,
    created_at: Instant,
    last_used: Instant,
}

impl Connection {
    /// Runs the full bring-up sequence: TCP/TLS connect, magic +
    /// version negotiation, HELLO, and LOGON. Returns a connection in
    /// `READY` or an error — there is no half-authenticated state
    /// visible outside this function.
    #[tracing::instrument(skip(transport_config, auth, registry, routing), fields(host = %transport_config.host))]
    pub async fn establish(
        transport_config: &TransportConfig,
        auth: &AuthConfig,
        user_agent: &str,
        handshake_timeout: Duration,
        registry: packstream::Registry,
        routing: Option<Dictionary>,
    ) -> Result<Connection> {
        let stream = transport::connect(transport_config).await?;
        let mut stream = stream;
        let agreed_version = handshake::negotiate(&mut stream, handshake_timeout).await?;

        let framed = Framed::new(stream.compat(), FrameCodec::default());
        let now = Instant::now();
        let mut conn = Connection {
            framed,
            state: ConnectionState::Negotiation,
            pending: None,
            agreed_version,
            registry,
            created_at: now,
            last_used: now,
        };

        let mut hello_extra = Dictionary::new();
        hello_extra.insert("user_agent", user_agent);
        if auth.scheme != "none" {
            hello_extra.insert("scheme", auth.scheme.as_str());
        }
        // `bolt_agent` was introduced in protocol 5.3; older servers
        // don't expect the field, so it's omitted below that (§6).
        let (major, minor) = handshake::decode_version(agreed_version);
        if (major, minor) >= (5, 3) {
            let mut bolt_agent = Dictionary::new();
            bolt_agent.insert("product", user_agent);
            bolt_agent.insert("language", "rust");
            bolt_agent.insert("language_details", format!("rustc/{}", option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")));
            bolt_agent.insert("platform", std::env::consts::OS);
            hello_extra.insert("bolt_agent", bolt_agent);
        }
        if let Some(routing) = routing {
            hello_extra.insert("routing", routing);
        }
        conn.request_response(Request::Hello { extra: hello_extra }).await?;

        let mut logon = Dictionary::new();
        logon.insert("scheme", auth.scheme.as_str());
        if let Some(principal) = &auth.principal {
            logon.insert("principal", principal.as_str());
        }
        if let Some(credentials) = &auth.credentials {
            logon.insert("credentials", credentials.as_str());
        }
        if let Some(realm) = &auth.realm {
            logon.insert("realm", realm.as_str());
        }
        conn.request_response(Request::Logon { auth: logon }).await?;

        Ok(conn)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn agreed_version(&self) -> (u8, u8) {
        handshake::decode_version(self.agreed_version)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub fn is_defunct(&self) -> bool {
        self.state == ConnectionState::Defunct
    }

    /// Validates the transition, serializes, frames, and writes
    /// `request`. A request illegal for the current state never
    /// touches the wire (§4.6, §8).
    #[tracing::instrument(skip(self, request), fields(request = request.name(), state = self.state.name()))]
    pub async fn send(&mut self, request: Request) -> Result<()> {
        self.state.check(&request)?;
        let structure = request.clone().into_structure();
        let mut buf = BytesMut::new();
        packstream::encode(&mut buf, &Value::Structure(structure))?;
        self.framed.send(buf.freeze()).await.map_err(|e| Error::ConnectionLost(e.to_string()))?;
        self.pending = Some(request);
        self.last_used = Instant::now();
        Ok(())
    }

    /// Reads and decodes one reassembled message. Advances the state
    /// machine when the message is a summary (§4.6 glossary).
    #[tracing::instrument(skip(self))]
    pub async fn receive(&mut self) -> Result<Response> {
        let raw = self
            .framed
            .next()
            .await
            .ok_or_else(|| Error::ConnectionLost("server closed the connection".into()))??;
        let (value, consumed) = packstream::decode(&raw)?;
        if consumed != raw.len() {
            return Err(Error::MalformedFrame(format!(
                "{} trailing bytes after top-level message value",
                raw.len() - consumed
            )));
        }
        let structure = match value {
            Value::Structure(s) => s,
            other => return Err(Error::InvalidMessage(format!("expected a message structure, found {}", other.kind()))),
        };
        let response = Response::from_structure(structure)?;
        self.last_used = Instant::now();

        if response.is_summary() {
            let outcome = match &response {
                Response::Success(_) => Outcome::Success,
                Response::Ignored => Outcome::Ignored,
                Response::Failure { .. } => Outcome::Failure,
                Response::Record(_) => unreachable!("records are not summaries"),
            };
            let request = self.pending.take().ok_or_else(|| {
                Error::ProtocolError("received a summary with no pending request".into())
            })?;
            self.state = self.state.advance(&request, outcome);
            if matches!(request, Request::Goodbye) {
                self.state = ConnectionState::Defunct;
            }
        }
        Ok(response)
    }

    /// Sends `request` and waits for its summary, surfacing
    /// server-reported failures as [`Error::DatabaseError`] — except a
    /// `HELLO`/`LOGON` failure, which is classified as
    /// [`Error::AuthenticationFailure`]/[`Error::AuthorizationFailure`]
    /// instead (§7). Intended for single-response messages (HELLO, LOGON,
    /// COMMIT, ...); `RUN` and the `PULL`/`DISCARD` loop are driven by
    /// `crate::session` since they interleave `RECORD`s with the summary.
    async fn request_response(&mut self, request: Request) -> Result<Dictionary> {
        let is_auth_request = matches!(request, Request::Hello { .. } | Request::Logon { .. });
        self.send(request).await?;
        match self.receive().await? {
            Response::Success(metadata) => Ok(metadata),
            Response::Ignored => Err(Error::ProtocolError("request was ignored while connection was open".into())),
            Response::Failure { code, message, metadata: _ } => Err(Self::classify_failure(is_auth_request, code, message)),
            Response::Record(_) => Err(Error::ProtocolError("unexpected RECORD for a non-streaming request".into())),
        }
    }

    /// Maps a server `FAILURE` to the taxonomy in §7. A `HELLO`/`LOGON`
    /// failure reports `Neo.ClientError.Security.Unauthorized` or
    /// `...Forbidden` rather than a generic `DatabaseError` — the same
    /// code-to-variant mapping the example Bolt server implementation
    /// uses for these two statuses.
    fn classify_failure(is_auth_request: bool, code: String, message: String) -> Error {
        if is_auth_request {
            match code.as_str() {
                "Neo.ClientError.Security.Unauthorized" => return Error::AuthenticationFailure(message),
                "Neo.ClientError.Security.Forbidden" => return Error::AuthorizationFailure(message),
                _ => {}
            }
        }
        Error::DatabaseError { classification: crate::error::Classification::from_code(&code), code, message }
    }

    /// Sends `RUN` and returns its own summary's metadata (column keys
    /// live under `"fields"`); callers then drive `PULL`/`DISCARD`
    /// themselves to stream records.
    pub async fn run(&mut self, query: &str, parameters: Dictionary, extra: Dictionary) -> Result<Dictionary> {
        self.request_response(Request::Run { query: query.to_owned(), parameters, extra }).await
    }

    pub async fn begin(&mut self, extra: Dictionary) -> Result<()> {
        self.request_response(Request::Begin { extra }).await.map(|_| ())
    }

    pub async fn commit(&mut self) -> Result<Dictionary> {
        self.request_response(Request::Commit).await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.request_response(Request::Rollback).await.map(|_| ())
    }

    /// Sends `RESET`, discarding whatever the connection was doing, and
    /// waits for the boundary `SUCCESS` that returns it to `READY`
    /// (§4.6). This does not clear `self.pending` before sending — a
    /// `RESET` sent mid-stream abandons the prior request's remaining
    /// `RECORD`s, which the server stops emitting once it processes the
    /// `RESET`.
    pub async fn reset(&mut self) -> Result<()> {
        self.pending = None;
        self.send(Request::Reset).await?;
        loop {
            match self.receive().await? {
                Response::Record(_) => continue,
                Response::Success(_) => return Ok(()),
                Response::Ignored => return Err(Error::ProtocolError("RESET was ignored".into())),
                Response::Failure { code, message, .. } => {
                    return Err(Error::DatabaseError { classification: crate::error::Classification::from_code(&code), code, message })
                }
            }
        }
    }

    /// Sends `GOODBYE` best-effort and closes the transport. Idempotent:
    /// closing an already-`DEFUNCT` connection is a no-op.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Defunct {
            return;
        }
        let structure = Request::Goodbye.into_structure();
        let mut buf = BytesMut::new();
        if packstream::encode(&mut buf, &Value::Structure(structure)).is_ok() {
            let _ = self.framed.send(buf.freeze()).await;
        }
        self.state = ConnectionState::Defunct;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreed_version_decodes_major_minor() {
        // Exercised indirectly via handshake tests; this just locks the
        // accessor's byte order against the wire example in §8.
        assert_eq!(handshake::decode_version(0x0000_0508), (5, 8));
    }

    #[test]
    fn hello_unauthorized_failure_classifies_as_authentication_failure() {
        let err = Connection::classify_failure(
            true,
            "Neo.ClientError.Security.Unauthorized".into(),
            "bad credentials".into(),
        );
        assert!(matches!(err, Error::AuthenticationFailure(_)));
    }

    #[test]
    fn logon_forbidden_failure_classifies_as_authorization_failure() {
        let err =
            Connection::classify_failure(true, "Neo.ClientError.Security.Forbidden".into(), "no access".into());
        assert!(matches!(err, Error::AuthorizationFailure(_)));
    }

    #[test]
    fn non_auth_request_never_classifies_as_authentication_failure() {
        let err = Connection::classify_failure(
            false,
            "Neo.ClientError.Security.Unauthorized".into(),
            "bad credentials".into(),
        );
        assert!(matches!(err, Error::DatabaseError { .. }));
    }

    #[test]
    fn hello_with_other_failure_code_stays_a_database_error() {
        let err = Connection::classify_failure(true, "Neo.ClientError.Statement.SyntaxError".into(), "oops".into());
        assert!(matches!(err, Error::DatabaseError { .. }));
    }
}
