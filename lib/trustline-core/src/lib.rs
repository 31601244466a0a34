//! Trust material and TLS context construction for trustline.
//!
//! This crate assembles the trust decisions of an HTTPS client at runtime:
//! - [`CertificateSource`] - inline PEM or a path to PEM/DER material
//! - [`CertificateStore`] - default roots, extra trusted certificates and an
//!   optional client identity
//! - [`TrustManagerResolver`] - strict validation, or the permissive
//!   self-signed mode with its [`SecurityDowngrade`] event
//! - [`SecureContextBuilder`] - the finished [`SecureClientContext`]
//! - [`TrustConfiguration`] - the `allow-self-signed`, `server-trusted-cert`,
//!   `client-cert` and `client-private-key` options
//! - [`TrustError`] and [`ClientConstructionError`] - error handling

mod config;
mod context;
mod error;
mod source;
mod store;
mod trust;

pub use config::{
    ALLOW_SELF_SIGNED, CLIENT_CERT, CLIENT_PRIVATE_KEY, PROP_DELIM, SERVER_TRUSTED_CERT,
    TrustConfiguration,
};
pub use context::{RedirectPolicy, SecureClientContext, SecureContextBuilder};
pub use error::{ClientConstructionError, Result, TrustError};
pub use source::CertificateSource;
pub use store::{CertificateStore, ClientIdentity};
pub use trust::{
    PermissiveTrustManager, PinnedCertificateVerifier, SecurityDowngrade, TrustManager,
    TrustManagerResolver, TrustManagerSet, TrustResolution,
};

// Re-export rustls for custom crypto providers and verifiers
pub use rustls;

/// Build a [`SecureClientContext`] from a [`TrustConfiguration`].
///
/// Trusted certificates are added in order, then the client identity, then
/// the trust managers are resolved. The first failure aborts the build.
pub fn build_context(
    config: &TrustConfiguration,
    redirect_policy: RedirectPolicy,
) -> Result<SecureClientContext> {
    let mut store = CertificateStore::new();
    for source in config.trusted_sources() {
        store.add_trusted_certificate(&source)?;
    }
    if let Some((certificate, private_key)) = config.identity_sources()? {
        store.add_client_identity(&certificate, &private_key)?;
    }

    let resolution = TrustManagerResolver::new().resolve(&store, config.allow_self_signed)?;
    SecureContextBuilder::new()
        .redirect_policy(redirect_policy)
        .build(&store, resolution)
}
