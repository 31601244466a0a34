//! Error types for trust material loading and client construction.

use derive_more::{Display, Error, From};

use crate::CertificateSource;

// ============================================================================
// Trust Error
// ============================================================================

/// Failure while loading trust material or initializing the TLS context.
///
/// Every variant that comes from a configured input names that input, so the
/// caller can tell which certificate or key file was rejected.
#[derive(Debug, Display, Error)]
pub enum TrustError {
    /// A trusted server certificate could not be read or parsed.
    #[display("cannot load trusted certificate {input}: {reason}")]
    CertificateLoad {
        /// Description of the offending source (path or inline PEM summary).
        input: String,
        /// What went wrong.
        reason: String,
    },

    /// The client certificate or private key could not be loaded, or they do
    /// not belong together.
    #[display("cannot load client identity from {input}: {reason}")]
    IdentityLoad {
        /// Description of the offending source (path or inline PEM summary).
        input: String,
        /// What went wrong.
        reason: String,
    },

    /// A client identity was already added to the certificate store.
    #[display("a client identity was already added to this certificate store")]
    DuplicateIdentity,

    /// Only one half of the client certificate/private key pair is configured.
    #[display("incomplete client identity: `{present}` is set but `{missing}` is blank")]
    IncompleteIdentity {
        /// Option that is configured.
        present: &'static str,
        /// Option that is missing.
        missing: &'static str,
    },

    /// The cryptographic provider refused to build the TLS context.
    #[display("TLS initialization failed: {_0}")]
    TlsInitialization(#[error(not(source))] String),
}

/// Result type alias using [`TrustError`].
pub type Result<T> = std::result::Result<T, TrustError>;

impl TrustError {
    /// Create a certificate load error for the given source.
    #[must_use]
    pub fn certificate_load(source: &CertificateSource, reason: impl Into<String>) -> Self {
        Self::CertificateLoad {
            input: source.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an identity load error for the given source.
    #[must_use]
    pub fn identity_load(source: &CertificateSource, reason: impl Into<String>) -> Self {
        Self::IdentityLoad {
            input: source.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a TLS initialization error.
    #[must_use]
    pub fn tls_initialization(message: impl Into<String>) -> Self {
        Self::TlsInitialization(message.into())
    }

    /// Returns `true` if a trusted certificate failed to load.
    #[must_use]
    pub const fn is_certificate_load(&self) -> bool {
        matches!(self, Self::CertificateLoad { .. })
    }

    /// Returns `true` if the client identity failed to load.
    #[must_use]
    pub const fn is_identity_load(&self) -> bool {
        matches!(self, Self::IdentityLoad { .. })
    }
}

// ============================================================================
// Client Construction Error
// ============================================================================

/// Umbrella error returned when an HTTPS client cannot be constructed.
///
/// No client is produced when this error is returned. The underlying
/// [`TrustError`] is available through [`ClientConstructionError::trust_error`]
/// and as the [`std::error::Error::source`].
#[derive(Debug, Display, Error, From)]
#[display("cannot construct HTTPS client: {source}")]
pub struct ClientConstructionError {
    source: TrustError,
}

impl ClientConstructionError {
    /// The failure that prevented construction.
    #[must_use]
    pub const fn trust_error(&self) -> &TrustError {
        &self.source
    }

    /// Consume the error, returning the underlying failure.
    #[must_use]
    pub fn into_trust_error(self) -> TrustError {
        self.source
    }
}
