//! Shared fixtures: a throwaway PKI generated with rcgen and an in-process
//! TLS server built on tokio-rustls and hyper.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose,
};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

// ============================================================================
// PKI
// ============================================================================

/// A certificate and its PKCS#8 private key, in PEM and DER.
pub struct Credential {
    pub cert_pem: String,
    pub cert_der: Vec<u8>,
    pub key_pem: String,
    pub key_der: Vec<u8>,
}

impl Credential {
    fn new(cert: &rcgen::Certificate, key: &KeyPair) -> Self {
        Self {
            cert_pem: cert.pem(),
            cert_der: cert.der().to_vec(),
            key_pem: key.serialize_pem(),
            key_der: key.serialize_der(),
        }
    }

    pub fn chain(&self) -> Vec<CertificateDer<'static>> {
        vec![CertificateDer::from(self.cert_der.clone())]
    }

    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivatePkcs8KeyDer::from(self.key_der.clone()).into()
    }
}

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    name
}

fn server_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(vec!["localhost".to_owned(), "127.0.0.1".to_owned()])
        .expect("server params");
    params.distinguished_name = distinguished_name(common_name);
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params
}

/// A self-signed server certificate for `localhost` and `127.0.0.1`.
pub fn self_signed_server() -> Credential {
    let key = KeyPair::generate().expect("key");
    let cert = server_params("self-signed server")
        .self_signed(&key)
        .expect("self-signed cert");
    Credential::new(&cert, &key)
}

/// A self-signed server certificate valid only for `host`.
pub fn self_signed_for(host: &str) -> Credential {
    let key = KeyPair::generate().expect("key");
    let mut params = CertificateParams::new(vec![host.to_owned()]).expect("server params");
    params.distinguished_name = distinguished_name(host);
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    let cert = params.self_signed(&key).expect("self-signed cert");
    Credential::new(&cert, &key)
}

/// A test certificate authority issuing server and client certificates,
/// with a scratch directory for writing them to disk.
pub struct Pki {
    pub ca: Credential,
    issuer: Issuer<'static, KeyPair>,
    dir: TempDir,
}

impl Pki {
    pub fn new() -> Self {
        let key = KeyPair::generate().expect("ca key");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("ca params");
        params.distinguished_name = distinguished_name("trustline test CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let cert = params.self_signed(&key).expect("ca cert");
        let ca = Credential::new(&cert, &key);

        Self {
            ca,
            issuer: Issuer::new(params, key),
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    /// Server certificate for `localhost` and `127.0.0.1`.
    pub fn server(&self) -> Credential {
        let key = KeyPair::generate().expect("server key");
        let cert = server_params("trustline test server")
            .signed_by(&key, &self.issuer)
            .expect("server cert");
        Credential::new(&cert, &key)
    }

    /// Client certificate for mutual TLS.
    pub fn client(&self) -> Credential {
        let key = KeyPair::generate().expect("client key");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("client params");
        params.distinguished_name = distinguished_name("trustline test client");
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        let cert = params.signed_by(&key, &self.issuer).expect("client cert");
        Credential::new(&cert, &key)
    }

    /// Write `contents` into the scratch directory and return the path.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path.display().to_string()
    }
}

// ============================================================================
// TLS server
// ============================================================================

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Server configuration without client authentication.
pub fn server_config(server: &Credential) -> Arc<ServerConfig> {
    let config = ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_no_client_auth()
        .with_single_cert(server.chain(), server.private_key())
        .expect("server config");
    Arc::new(config)
}

/// Server configuration requiring a client certificate issued by `client_ca`.
pub fn mtls_server_config(server: &Credential, client_ca: &Credential) -> Arc<ServerConfig> {
    let mut roots = RootCertStore::empty();
    roots
        .add(CertificateDer::from(client_ca.cert_der.clone()))
        .expect("client CA");
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider())
        .build()
        .expect("client verifier");

    let config = ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_client_cert_verifier(verifier)
        .with_single_cert(server.chain(), server.private_key())
        .expect("server config");
    Arc::new(config)
}

/// HTTPS server on `127.0.0.1`, serving:
/// - `/service?id=<id>`: a JSON message with a per-server call counter
/// - `/moved`: 301 to `/service?id=moved`
/// - `/downgrade`: 302 to a plain `http` URL
pub struct TestServer {
    addr: SocketAddr,
}

impl TestServer {
    pub async fn start(config: Arc<ServerConfig>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let acceptor = TlsAcceptor::from(config);
        let counter = Arc::new(AtomicUsize::new(0));

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    // Rejected handshakes are part of the tests
                    let Ok(tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    let service = service_fn(move |request| handle(request, Arc::clone(&counter)));
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(tls), service)
                        .await;
                });
            }
        });

        Self { addr }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("https://127.0.0.1:{}{path_and_query}", self.addr.port())
    }
}

async fn handle(
    request: hyper::Request<Incoming>,
    counter: Arc<AtomicUsize>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let builder = hyper::Response::builder();
    let response = match request.uri().path() {
        "/service" => {
            let id = request
                .uri()
                .query()
                .and_then(|query| {
                    url::form_urlencoded::parse(query.as_bytes())
                        .find(|(key, _)| key == "id")
                        .map(|(_, value)| value.into_owned())
                })
                .unwrap_or_default();
            let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let body = serde_json::json!({
                "msg": format!("Returned HTTP message for parameter {id}, {count}"),
                "details": {
                    "isActive": true,
                    "nestedDetails": { "balance": "$1,729.34" }
                }
            });
            builder
                .header("content-type", "application/json")
                .body(Full::new(Bytes::from(body.to_string())))
        }
        "/moved" => builder
            .status(301)
            .header("location", "/service?id=moved")
            .body(Full::default()),
        "/downgrade" => builder
            .status(302)
            .header("location", "http://127.0.0.1:9/service?id=plain")
            .body(Full::default()),
        _ => builder.status(404).body(Full::default()),
    };

    Ok(response.expect("response"))
}
