//! Trust managers and their resolution.
//!
//! A [`TrustManager`] is either a strict verifier built by the
//! [`CertificateStore`] (WebPKI chains, or a [`PinnedCertificateVerifier`]
//! for exact trusted leaves) or a [`PermissiveTrustManager`] decorating one. The
//! [`TrustManagerResolver`] picks between the two based on the
//! `allow-self-signed` option and reports the downgrade as a
//! [`SecurityDowngrade`] event.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::verify_server_name;
use rustls::crypto::{
    CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature,
};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};
use tracing::{trace, warn};

use crate::config::SERVER_TRUSTED_CERT;
use crate::{CertificateStore, Result};

// ============================================================================
// Trust Manager
// ============================================================================

/// A single server certificate verifier.
#[derive(Debug, Clone)]
pub enum TrustManager {
    /// Full chain-of-trust validation.
    Strict(Arc<dyn ServerCertVerifier>),
    /// Chain validation disabled; see [`PermissiveTrustManager`].
    Permissive(PermissiveTrustManager),
}

impl TrustManager {
    /// Returns `true` if chain validation is disabled.
    #[must_use]
    pub const fn is_permissive(&self) -> bool {
        matches!(self, Self::Permissive(_))
    }

    /// Wrap a strict manager in a [`PermissiveTrustManager`].
    ///
    /// Already permissive managers are returned unchanged.
    #[must_use]
    pub fn into_permissive(self) -> Self {
        match self {
            Self::Strict(inner) => Self::Permissive(PermissiveTrustManager::new(inner)),
            permissive @ Self::Permissive(_) => permissive,
        }
    }

    fn verifier(&self) -> &dyn ServerCertVerifier {
        match self {
            Self::Strict(inner) => inner.as_ref(),
            Self::Permissive(permissive) => permissive,
        }
    }
}

/// Checks that `end_entity` is valid for `server_name`.
fn verify_hostname(
    end_entity: &CertificateDer<'_>,
    server_name: &ServerName<'_>,
) -> std::result::Result<(), rustls::Error> {
    let parsed = ParsedCertificate::try_from(end_entity)?;
    verify_server_name(&parsed, server_name)
}

// ============================================================================
// Pinned certificates
// ============================================================================

/// Strict manager accepting a server whose leaf certificate is one of the
/// explicitly trusted certificates.
///
/// A trusted CA-issued leaf is not a trust anchor for WebPKI, so it needs this
/// exact match. The hostname is still checked.
#[derive(Debug, Clone)]
pub struct PinnedCertificateVerifier {
    certificates: Vec<CertificateDer<'static>>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl PinnedCertificateVerifier {
    /// Trust exactly `certificates`, verifying signatures with `provider`.
    #[must_use]
    pub fn new(certificates: Vec<CertificateDer<'static>>, provider: &CryptoProvider) -> Self {
        Self {
            certificates,
            algorithms: provider.signature_verification_algorithms,
        }
    }

    fn is_pinned(&self, end_entity: &CertificateDer<'_>) -> bool {
        self.certificates
            .iter()
            .any(|cert| cert.as_ref() == end_entity.as_ref())
    }
}

impl ServerCertVerifier for PinnedCertificateVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        if !self.is_pinned(end_entity) {
            return Err(rustls::Error::InvalidCertificate(
                CertificateError::UnknownIssuer,
            ));
        }
        verify_hostname(end_entity, server_name)?;
        trace!(server_name = ?server_name, "server certificate matches a trusted certificate");
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

// ============================================================================
// Permissive
// ============================================================================

/// Decorator accepting any server certificate chain.
///
/// Only the chain-of-trust check is bypassed: the certificate must still be
/// valid for the requested host, and handshake signatures are verified by the
/// wrapped manager, so the server must own the key of the certificate it
/// presents.
#[derive(Debug, Clone)]
pub struct PermissiveTrustManager {
    inner: Arc<dyn ServerCertVerifier>,
}

impl PermissiveTrustManager {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn ServerCertVerifier>) -> Self {
        Self { inner }
    }
}

impl ServerCertVerifier for PermissiveTrustManager {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        verify_hostname(end_entity, server_name)?;
        trace!(server_name = ?server_name, "server certificate accepted without chain validation");
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }

    fn requires_raw_public_keys(&self) -> bool {
        self.inner.requires_raw_public_keys()
    }
}

// ============================================================================
// Trust Manager Set
// ============================================================================

/// Ordered trust managers installed into one TLS context.
///
/// A server chain is trusted as soon as one manager accepts it; otherwise the
/// first manager's rejection is reported. Handshake signatures and signature
/// schemes are handled by the first manager.
#[derive(Debug, Clone)]
pub struct TrustManagerSet {
    managers: Vec<TrustManager>,
}

impl TrustManagerSet {
    /// Create a set from `managers`, keeping their order.
    #[must_use]
    pub fn new(managers: Vec<TrustManager>) -> Self {
        Self { managers }
    }

    /// Number of managers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Returns `true` if the set holds no manager.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Managers, in order.
    pub fn iter(&self) -> impl Iterator<Item = &TrustManager> {
        self.managers.iter()
    }

    /// Returns `true` if any manager skips chain validation.
    #[must_use]
    pub fn is_permissive(&self) -> bool {
        self.managers.iter().any(TrustManager::is_permissive)
    }

    /// Wrap every strict manager in a [`PermissiveTrustManager`].
    #[must_use]
    pub fn into_permissive(self) -> Self {
        Self {
            managers: self
                .managers
                .into_iter()
                .map(TrustManager::into_permissive)
                .collect(),
        }
    }

    fn primary(&self) -> std::result::Result<&dyn ServerCertVerifier, rustls::Error> {
        self.managers
            .first()
            .map(TrustManager::verifier)
            .ok_or_else(|| rustls::Error::General("no trust manager configured".to_owned()))
    }
}

impl ServerCertVerifier for TrustManagerSet {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let mut first_error = None;
        for manager in &self.managers {
            match manager.verifier().verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            ) {
                Ok(verified) => return Ok(verified),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        Err(first_error.unwrap_or(rustls::Error::InvalidCertificate(
            CertificateError::UnknownIssuer,
        )))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.primary()?.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.primary()?.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.primary()
            .map(|verifier| verifier.supported_verify_schemes())
            .unwrap_or_default()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Emitted when certificate chain validation has been disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDowngrade {
    /// Number of trust managers that were wrapped.
    pub wrapped_managers: usize,
    /// Option to use instead of disabling validation.
    pub safer_option: &'static str,
}

/// Outcome of [`TrustManagerResolver::resolve`].
#[derive(Debug, Clone)]
pub struct TrustResolution {
    /// Managers to install into the TLS context.
    pub managers: TrustManagerSet,
    /// Present when chain validation was disabled.
    pub downgrade: Option<SecurityDowngrade>,
}

/// Chooses between the store's trust managers and their permissive wrapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustManagerResolver;

impl TrustManagerResolver {
    /// Create a resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Build the trust managers of `store`, wrapping them permissively when
    /// `allow_self_signed` is set.
    pub fn resolve(
        &self,
        store: &CertificateStore,
        allow_self_signed: bool,
    ) -> Result<TrustResolution> {
        let managers = store.build_trust_managers()?;
        if !allow_self_signed {
            return Ok(TrustResolution {
                managers,
                downgrade: None,
            });
        }

        let wrapped_managers = managers.iter().filter(|m| !m.is_permissive()).count();
        warn!(
            wrapped_managers,
            "accepting self-signed server certificates without chain validation is not \
             recommended; add the server certificate to `{SERVER_TRUSTED_CERT}` instead"
        );

        Ok(TrustResolution {
            managers: managers.into_permissive(),
            downgrade: Some(SecurityDowngrade {
                wrapped_managers,
                safer_option: SERVER_TRUSTED_CERT,
            }),
        })
    }
}
