//! In-memory trust and identity store.
//!
//! [`CertificateStore`] collects the extra trusted server certificates and at
//! most one client identity, then snapshots them into trust managers and a
//! rustls [`ClientConfig`]. All additions must happen before the build calls:
//! trust managers copy the store content and never see later changes.

use std::fmt;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, InconsistentKeys, RootCertStore};
use tracing::debug;

use crate::source::subject_of;
use crate::trust::{PinnedCertificateVerifier, TrustManager, TrustManagerSet};
use crate::{CertificateSource, Result, TrustError};

/// A trusted certificate and its generated alias.
#[derive(Debug, Clone)]
struct TrustedCertificate {
    alias: String,
    der: CertificateDer<'static>,
}

/// Certificate chain and private key presented for mutual TLS.
pub struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    /// Certificate chain, leaf first.
    #[must_use]
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Trusted certificates plus an optional client identity.
pub struct CertificateStore {
    provider: Arc<CryptoProvider>,
    trusted: Vec<TrustedCertificate>,
    identity: Option<ClientIdentity>,
    next_alias: usize,
}

impl fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateStore")
            .field("aliases", &self.aliases().collect::<Vec<_>>())
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Default for CertificateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateStore {
    /// Create an empty store backed by the `ring` crypto provider.
    #[must_use]
    pub fn new() -> Self {
        Self::with_provider(Arc::new(rustls::crypto::ring::default_provider()))
    }

    /// Create an empty store backed by a specific crypto provider.
    #[must_use]
    pub fn with_provider(provider: Arc<CryptoProvider>) -> Self {
        Self {
            provider,
            trusted: Vec::new(),
            identity: None,
            next_alias: 0,
        }
    }

    /// Crypto provider used for keys, verifiers and the TLS context.
    #[must_use]
    pub fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// Add every certificate of `source` as a trusted server certificate.
    ///
    /// Each certificate is stored under a fresh alias.
    pub fn add_trusted_certificate(&mut self, source: &CertificateSource) -> Result<()> {
        let certs = source
            .certificates()
            .map_err(|reason| TrustError::certificate_load(source, reason))?;

        // Reject certificates that cannot act as trust anchors now rather
        // than when the trust managers are built.
        let mut anchors = RootCertStore::empty();
        for der in &certs {
            anchors
                .add(der.clone())
                .map_err(|e| TrustError::certificate_load(source, e.to_string()))?;
        }

        for der in certs {
            let alias = self.generate_alias();
            debug!(
                alias = %alias,
                subject = subject_of(&der).as_deref().unwrap_or("<unknown>"),
                source = %source,
                "trusted certificate added"
            );
            self.trusted.push(TrustedCertificate { alias, der });
        }

        Ok(())
    }

    /// Install the client identity used for mutual TLS.
    ///
    /// The key must be unencrypted (PKCS#8, PKCS#1 or SEC1, PEM or DER) and
    /// must match the first certificate of the chain.
    pub fn add_client_identity(
        &mut self,
        certificate: &CertificateSource,
        private_key: &CertificateSource,
    ) -> Result<()> {
        if self.identity.is_some() {
            return Err(TrustError::DuplicateIdentity);
        }

        let chain = certificate
            .certificates()
            .map_err(|reason| TrustError::identity_load(certificate, reason))?;
        let key = private_key
            .private_key()
            .map_err(|reason| TrustError::identity_load(private_key, reason))?;

        let signing_key = self
            .provider
            .key_provider
            .load_private_key(key.clone_key())
            .map_err(|e| TrustError::identity_load(private_key, format!("unusable key: {e}")))?;

        ensure_key_matches(
            &CertifiedKey::new(chain.clone(), signing_key),
            certificate,
            private_key,
        )?;

        debug!(
            certificate = %certificate,
            subject = chain.first().and_then(subject_of).as_deref().unwrap_or("<unknown>"),
            "client identity added"
        );
        self.identity = Some(ClientIdentity { chain, key });
        Ok(())
    }

    /// Build the default trust managers.
    ///
    /// The root store holds the bundled Mozilla roots plus every added
    /// certificate, so added certificates extend the default trust. When
    /// certificates were added, a second manager also accepts a server
    /// presenting one of them as its leaf. An empty store yields the default
    /// trust managers.
    pub fn build_trust_managers(&self) -> Result<TrustManagerSet> {
        let mut roots: RootCertStore = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
        for cert in &self.trusted {
            roots.add(cert.der.clone()).map_err(|e| {
                TrustError::tls_initialization(format!("cannot trust `{}`: {e}", cert.alias))
            })?;
        }

        let verifier =
            WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&self.provider))
                .build()
                .map_err(|e| TrustError::tls_initialization(e.to_string()))?;

        let mut managers = vec![TrustManager::Strict(verifier)];
        if !self.trusted.is_empty() {
            let pinned = self.trusted.iter().map(|cert| cert.der.clone()).collect();
            let pinned = PinnedCertificateVerifier::new(pinned, &self.provider);
            managers.push(TrustManager::Strict(Arc::new(pinned)));
        }

        Ok(TrustManagerSet::new(managers))
    }

    /// Build a rustls client configuration from `trust_managers` and the
    /// client identity, if any.
    pub fn build_tls_context(&self, trust_managers: TrustManagerSet) -> Result<Arc<ClientConfig>> {
        let builder = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| TrustError::tls_initialization(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(trust_managers));

        let config = match &self.identity {
            Some(identity) => builder
                .with_client_auth_cert(identity.chain.clone(), identity.key.clone_key())
                .map_err(|e| TrustError::tls_initialization(e.to_string()))?,
            None => builder.with_no_client_auth(),
        };

        Ok(Arc::new(config))
    }

    /// Number of trusted certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trusted.len()
    }

    /// Returns `true` if no trusted certificate was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trusted.is_empty()
    }

    /// Aliases of the trusted certificates, in insertion order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.trusted.iter().map(|cert| cert.alias.as_str())
    }

    /// Trusted certificate stored under `alias`.
    #[must_use]
    pub fn certificate(&self, alias: &str) -> Option<&CertificateDer<'static>> {
        self.trusted
            .iter()
            .find(|cert| cert.alias == alias)
            .map(|cert| &cert.der)
    }

    /// The client identity, if one was added.
    #[must_use]
    pub const fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    /// Returns `true` if a client identity was added.
    #[must_use]
    pub const fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    fn generate_alias(&mut self) -> String {
        let alias = format!("trusted-{}", self.next_alias);
        self.next_alias += 1;
        alias
    }
}

/// The key must be the one certified by the leaf of the chain. Keys that
/// cannot expose their public half are refused since the pairing cannot be
/// checked.
fn ensure_key_matches(
    certified: &CertifiedKey,
    certificate: &CertificateSource,
    private_key: &CertificateSource,
) -> Result<()> {
    certified.keys_match().map_err(|e| match e {
        rustls::Error::InconsistentKeys(InconsistentKeys::Unknown) => TrustError::identity_load(
            private_key,
            format!("cannot check that the key matches certificate {certificate}"),
        ),
        e => TrustError::identity_load(
            private_key,
            format!("key does not match certificate {certificate}: {e}"),
        ),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert2::{check, let_assert};
    use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};

    use super::*;

    fn self_signed_pem() -> (String, String) {
        let key = KeyPair::generate().expect("key");
        let params = CertificateParams::new(vec!["localhost".to_owned()]).expect("params");
        let cert = params.self_signed(&key).expect("cert");
        (cert.pem(), key.serialize_pem())
    }

    #[test]
    fn empty_store_builds_default_trust_managers() {
        let store = CertificateStore::new();
        check!(store.is_empty());

        let managers = store.build_trust_managers().expect("managers");
        check!(managers.len() == 1);
        check!(!managers.is_permissive());
    }

    #[test]
    fn aliases_are_unique() {
        let mut store = CertificateStore::new();
        for _ in 0..3 {
            let (cert, _) = self_signed_pem();
            store
                .add_trusted_certificate(&CertificateSource::parse(&cert))
                .expect("add");
        }

        let aliases: HashSet<_> = store.aliases().collect();
        check!(aliases.len() == 3);
        check!(store.certificate("trusted-0").is_some());
        check!(store.certificate("trusted-3").is_none());
    }

    #[test]
    fn invalid_trusted_certificate_is_rejected() {
        let mut store = CertificateStore::new();
        let source = CertificateSource::parse("/nonexistent/invalid.crt");

        let_assert!(Err(err) = store.add_trusted_certificate(&source));
        check!(err.is_certificate_load());
        check!(err.to_string().contains("/nonexistent/invalid.crt"));
        check!(store.is_empty());
    }

    #[test]
    fn client_identity_is_added_once() {
        let (cert, key) = self_signed_pem();
        let cert = CertificateSource::parse(&cert);
        let key = CertificateSource::parse(&key);

        let mut store = CertificateStore::new();
        store.add_client_identity(&cert, &key).expect("identity");
        check!(store.has_identity());

        let_assert!(Err(TrustError::DuplicateIdentity) = store.add_client_identity(&cert, &key));
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let (cert, _) = self_signed_pem();
        let (_, other_key) = self_signed_pem();

        let mut store = CertificateStore::new();
        let_assert!(
            Err(err) = store.add_client_identity(
                &CertificateSource::parse(&cert),
                &CertificateSource::parse(&other_key),
            )
        );
        check!(err.is_identity_load());
        check!(!store.has_identity());
    }

    #[test]
    fn unreadable_key_is_rejected() {
        let (cert, _) = self_signed_pem();

        let mut store = CertificateStore::new();
        let_assert!(
            Err(TrustError::IdentityLoad { input, .. }) = store.add_client_identity(
                &CertificateSource::parse(&cert),
                &CertificateSource::parse("/nonexistent/invalid.pem"),
            )
        );
        check!(input == "/nonexistent/invalid.pem");
    }

    #[derive(Debug)]
    struct OpaqueKey;

    impl rustls::sign::SigningKey for OpaqueKey {
        fn choose_scheme(
            &self,
            _offered: &[rustls::SignatureScheme],
        ) -> Option<Box<dyn rustls::sign::Signer>> {
            None
        }

        fn algorithm(&self) -> rustls::SignatureAlgorithm {
            rustls::SignatureAlgorithm::ECDSA
        }
    }

    #[test]
    fn key_without_public_half_is_rejected() {
        let (cert, _) = self_signed_pem();
        let cert = CertificateSource::parse(&cert);
        let key = CertificateSource::parse("/certs/hsm.key");
        let chain = cert.certificates().expect("chain");

        let certified = CertifiedKey::new(chain, Arc::new(OpaqueKey));
        let_assert!(
            Err(TrustError::IdentityLoad { input, reason }) =
                ensure_key_matches(&certified, &cert, &key)
        );
        check!(input == "/certs/hsm.key");
        check!(reason.contains("cannot check"));
    }

    #[test]
    fn unreadable_certificate_is_identity_error() {
        let (_, key) = self_signed_pem();

        let mut store = CertificateStore::new();
        let_assert!(
            Err(TrustError::IdentityLoad { input, .. }) = store.add_client_identity(
                &CertificateSource::parse("/nonexistent/invalid.crt"),
                &CertificateSource::parse(&key),
            )
        );
        check!(input == "/nonexistent/invalid.crt");
        check!(!store.has_identity());
    }

    #[test]
    fn trusted_ca_is_accepted_as_anchor() {
        let ca_key = KeyPair::generate().expect("key");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("params");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca = params.self_signed(&ca_key).expect("ca");

        let mut store = CertificateStore::new();
        store
            .add_trusted_certificate(&CertificateSource::parse(&ca.pem()))
            .expect("add ca");
        check!(store.len() == 1);
        store.build_trust_managers().expect("managers");
    }

    #[test]
    fn tls_context_carries_client_identity() {
        let (cert, key) = self_signed_pem();
        let mut store = CertificateStore::new();
        store
            .add_client_identity(&CertificateSource::parse(&cert), &CertificateSource::parse(&key))
            .expect("identity");

        let managers = store.build_trust_managers().expect("managers");
        let config = store.build_tls_context(managers).expect("context");
        check!(config.client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn tls_context_without_identity() {
        let store = CertificateStore::new();
        let managers = store.build_trust_managers().expect("managers");
        let config = store.build_tls_context(managers).expect("context");
        check!(!config.client_auth_cert_resolver.has_certs());
    }
}
