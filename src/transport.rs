//! Transport (§4.5): a duplex byte channel over plain TCP or TLS, with
//! connect timeouts and a choice of certificate trust policy.

use std::net::ToSocketAddrs as _;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

/// How the client decides whether to trust the server's certificate
/// when `encrypted` is set (§6 URI scheme table).
#[derive(Clone)]
pub enum TrustMode {
    /// Validate against the platform's trust store.
    System,
    /// Validate against a caller-supplied CA bundle, PEM-encoded.
    CustomCa(Vec<u8>),
    /// Accept any certificate, including self-signed ones (`+ssc` schemes).
    AllowAny,
    /// Accept a certificate iff the predicate returns true for its DER bytes.
    CustomPredicate(Arc<dyn Fn(&[u8]) -> bool + Send + Sync>),
}

impl std::fmt::Debug for TrustMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustMode::System => write!(f, "System"),
            TrustMode::CustomCa(_) => write!(f, "CustomCa(..)"),
            TrustMode::AllowAny => write!(f, "AllowAny"),
            TrustMode::CustomPredicate(_) => write!(f, "CustomPredicate(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub encrypted: bool,
    pub trust: TrustMode,
    pub connect_timeout: Duration,
}

/// A connected, duplex byte stream. Erased behind a trait object so the
/// rest of the driver doesn't need to carry the TLS type parameter
/// around; `TCP_NODELAY` is set before the stream is boxed.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}

pub type BoxedStream = Box<dyn Stream>;

/// Connects to `config.host:config.port`, performing a TLS handshake
/// first if `config.encrypted` is set. The whole operation — DNS
/// resolution, TCP connect, and TLS handshake — is bounded by
/// `config.connect_timeout` (§4.5, §5).
#[tracing::instrument(skip(config), fields(host = %config.host, port = config.port, encrypted = config.encrypted))]
pub async fn connect(config: &TransportConfig) -> Result<BoxedStream> {
    let fut = connect_inner(config);
    match tokio::time::timeout(config.connect_timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::ConnectTimeout(config.connect_timeout)),
    }
}

async fn connect_inner(config: &TransportConfig) -> Result<BoxedStream> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port))
        .await
        .map_err(|e| Error::ServiceUnavailable(format!("{}:{}: {e}", config.host, config.port)))?;
    tcp.set_nodelay(true).map_err(Error::Io)?;

    if !config.encrypted {
        return Ok(Box::new(tcp));
    }

    #[cfg(feature = "rustls")]
    {
        let tls = tls::handshake(config, tcp).await?;
        Ok(Box::new(tls))
    }
    #[cfg(not(feature = "rustls"))]
    {
        Err(Error::TlsFailure("crate built without the \"rustls\" feature".into()))
    }
}

/// Resolves `host:port` without connecting; used by callers that want to
/// fail fast on a bad hostname before entering the retry-driven pool path.
pub fn resolve(host: &str, port: u16) -> Result<()> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::ServiceUnavailable(format!("cannot resolve {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| Error::ServiceUnavailable(format!("no addresses for {host}:{port}")))?;
    Ok(())
}

#[cfg(feature = "rustls")]
mod tls {
    use super::*;
    use rustls::client::{ServerCertVerified, ServerCertVerifier};
    use rustls::{Certificate, ClientConfig, RootCertStore, ServerName};
    use std::convert::TryFrom;
    use tokio_rustls::TlsConnector;

    pub async fn handshake(
        config: &TransportConfig,
        tcp: TcpStream,
    ) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
        let client_config = build_client_config(&config.trust)?;
        let connector = TlsConnector::from(Arc::new(client_config));
        let server_name = ServerName::try_from(config.host.as_str())
            .map_err(|_| Error::TlsFailure(format!("invalid DNS name: {}", config.host)))?;
        connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::TlsFailure(e.to_string()))
    }

    fn build_client_config(trust: &TrustMode) -> Result<ClientConfig> {
        let builder = ClientConfig::builder().with_safe_defaults();
        let config = match trust {
            TrustMode::System => {
                let mut store = RootCertStore::empty();
                for cert in rustls_native_certs::load_native_certs()
                    .map_err(|e| Error::TlsFailure(format!("loading system trust store: {e}")))?
                {
                    store
                        .add(&Certificate(cert.0))
                        .map_err(|e| Error::TlsFailure(format!("invalid system CA certificate: {e}")))?;
                }
                builder.with_root_certificates(store).with_no_client_auth()
            }
            TrustMode::CustomCa(pem) => {
                let mut store = RootCertStore::empty();
                let mut reader = std::io::Cursor::new(pem);
                for der in rustls_pemfile::certs(&mut reader)
                    .map_err(|e| Error::TlsFailure(format!("parsing custom CA bundle: {e}")))?
                {
                    store
                        .add(&Certificate(der))
                        .map_err(|e| Error::TlsFailure(format!("invalid custom CA certificate: {e}")))?;
                }
                builder.with_root_certificates(store).with_no_client_auth()
            }
            TrustMode::AllowAny => builder
                .with_custom_certificate_verifier(Arc::new(AcceptAnyVerifier))
                .with_no_client_auth(),
            TrustMode::CustomPredicate(predicate) => builder
                .with_custom_certificate_verifier(Arc::new(PredicateVerifier(predicate.clone())))
                .with_no_client_auth(),
        };
        Ok(config)
    }

    /// Backs the `+ssc` URI schemes: accept self-signed certificates.
    /// Requires the `dangerous_configuration` cargo feature on
    /// `tokio-rustls`, same as the teacher's vendored-TLS path does for
    /// its own trust overrides.
    struct AcceptAnyVerifier;

    impl ServerCertVerifier for AcceptAnyVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &Certificate,
            _intermediates: &[Certificate],
            _server_name: &ServerName,
            _scts: &mut dyn Iterator<Item = &[u8]>,
            _ocsp_response: &[u8],
            _now: SystemTime,
        ) -> std::result::Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }
    }

    struct PredicateVerifier(Arc<dyn Fn(&[u8]) -> bool + Send + Sync>);

    impl ServerCertVerifier for PredicateVerifier {
        fn verify_server_cert(
            &self,
            end_entity: &Certificate,
            _intermediates: &[Certificate],
            _server_name: &ServerName,
            _scts: &mut dyn Iterator<Item = &[u8]>,
            _ocsp_response: &[u8],
            _now: SystemTime,
        ) -> std::result::Result<ServerCertVerified, rustls::Error> {
            if (self.0)(&end_entity.0) {
                Ok(ServerCertVerified::assertion())
            } else {
                Err(rustls::Error::General("custom certificate predicate rejected the server certificate".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_localhost_succeeds() {
        resolve("localhost", 7687).unwrap();
    }

    #[test]
    fn resolve_unroutable_host_fails() {
        assert!(resolve("this.host.does.not.exist.invalid", 7687).is_err());
    }
}
