//! Secure client context: the finished TLS configuration and the connection
//! parameters that travel with it.

use std::fmt;
use std::sync::Arc;

use rustls::ClientConfig;
use tracing::debug;

use crate::trust::{SecurityDowngrade, TrustResolution};
use crate::{CertificateStore, Result};

/// Redirect handling, mirroring the classic `NEVER`/`NORMAL`/`ALWAYS` policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    /// Never follow redirects.
    Never,
    /// Follow redirects, except from `https` to `http`.
    #[default]
    Normal,
    /// Always follow redirects.
    Always,
}

impl RedirectPolicy {
    /// Whether a redirect from `from_scheme` to `to_scheme` is followed.
    #[must_use]
    pub fn follows(self, from_scheme: &str, to_scheme: &str) -> bool {
        match self {
            Self::Never => false,
            Self::Normal => {
                !(from_scheme.eq_ignore_ascii_case("https")
                    && to_scheme.eq_ignore_ascii_case("http"))
            }
            Self::Always => true,
        }
    }
}

/// TLS configuration plus connection parameters, fixed for a client's lifetime.
#[derive(Clone)]
pub struct SecureClientContext {
    tls_config: Arc<ClientConfig>,
    need_client_auth: bool,
    redirect_policy: RedirectPolicy,
    has_client_identity: bool,
    trusted_certificates: usize,
    security_downgrade: Option<SecurityDowngrade>,
}

impl fmt::Debug for SecureClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureClientContext")
            .field("need_client_auth", &self.need_client_auth)
            .field("redirect_policy", &self.redirect_policy)
            .field("has_client_identity", &self.has_client_identity)
            .field("trusted_certificates", &self.trusted_certificates)
            .field("security_downgrade", &self.security_downgrade)
            .finish_non_exhaustive()
    }
}

impl SecureClientContext {
    /// The rustls client configuration.
    #[must_use]
    pub fn tls_config(&self) -> &Arc<ClientConfig> {
        &self.tls_config
    }

    /// Client authentication is always prepared: the identity, when
    /// configured, is presented to every server that requests one.
    #[must_use]
    pub const fn need_client_auth(&self) -> bool {
        self.need_client_auth
    }

    /// Redirect policy for clients using this context.
    #[must_use]
    pub const fn redirect_policy(&self) -> RedirectPolicy {
        self.redirect_policy
    }

    /// Returns `true` if a client identity is installed.
    #[must_use]
    pub const fn has_client_identity(&self) -> bool {
        self.has_client_identity
    }

    /// Number of certificates added on top of the default roots.
    #[must_use]
    pub const fn trusted_certificates(&self) -> usize {
        self.trusted_certificates
    }

    /// Set when server certificate chain validation is disabled.
    #[must_use]
    pub const fn security_downgrade(&self) -> Option<&SecurityDowngrade> {
        self.security_downgrade.as_ref()
    }
}

/// Combines resolved trust managers and the store's identity into a
/// [`SecureClientContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureContextBuilder {
    redirect_policy: RedirectPolicy,
}

impl SecureContextBuilder {
    /// Create a builder using [`RedirectPolicy::Normal`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the redirect policy.
    #[must_use]
    pub const fn redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.redirect_policy = policy;
        self
    }

    /// Build the context.
    pub fn build(
        &self,
        store: &CertificateStore,
        resolution: TrustResolution,
    ) -> Result<SecureClientContext> {
        let permissive = resolution.managers.is_permissive();
        let tls_config = store.build_tls_context(resolution.managers)?;

        debug!(
            trusted_certificates = store.len(),
            client_identity = store.has_identity(),
            permissive,
            redirect_policy = ?self.redirect_policy,
            "secure client context built"
        );

        Ok(SecureClientContext {
            tls_config,
            need_client_auth: true,
            redirect_policy: self.redirect_policy,
            has_client_identity: store.has_identity(),
            trusted_certificates: store.len(),
            security_downgrade: resolution.downgrade,
        })
    }
}
