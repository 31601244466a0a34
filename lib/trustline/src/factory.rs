//! Client factory: trust configuration in, ready HTTPS client out.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::{debug, warn};
use trustline_core::{ClientConstructionError, RedirectPolicy, TrustConfiguration, build_context};

use crate::{ClientOptions, HttpsClient};

/// Builds [`HttpsClient`]s from trust configurations.
///
/// Each call assembles a fresh certificate store and TLS context; nothing is
/// cached between calls, so clients built from different configurations
/// never influence each other.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    options: ClientOptions,
    redirect_policy: RedirectPolicy,
}

impl HttpClientFactory {
    /// Factory with default options and [`RedirectPolicy::Normal`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with custom client options.
    #[must_use]
    pub fn with_options(options: ClientOptions) -> Self {
        Self {
            options,
            redirect_policy: RedirectPolicy::default(),
        }
    }

    /// Override the redirect policy of created clients.
    #[must_use]
    pub const fn redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.redirect_policy = policy;
        self
    }

    /// Options applied to created clients.
    #[must_use]
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Build a client from a trust configuration.
    ///
    /// Trusted certificates are loaded in order, then the client identity,
    /// then the trust managers are resolved. Any failure aborts the build and
    /// no client is returned.
    pub fn create_client(
        &self,
        config: &TrustConfiguration,
    ) -> Result<HttpsClient, ClientConstructionError> {
        let context = build_context(config, self.redirect_policy).inspect_err(|err| {
            warn!(error = %err, "cannot construct HTTPS client");
        })?;

        debug!(
            trusted_certificates = context.trusted_certificates(),
            client_identity = context.has_client_identity(),
            allow_self_signed = config.allow_self_signed,
            "HTTPS client created"
        );

        Ok(HttpsClient::builder(context)
            .options(self.options.clone())
            .build())
    }

    /// Build a client from a property map using the `allow-self-signed`,
    /// `server-trusted-cert`, `client-cert` and `client-private-key` keys.
    pub fn create_client_from_properties<S: BuildHasher>(
        &self,
        properties: &HashMap<String, String, S>,
    ) -> Result<HttpsClient, ClientConstructionError> {
        self.create_client(&TrustConfiguration::from_properties(properties))
    }
}

/// Build a client with default options.
///
/// # Example
///
/// ```
/// use trustline::{TrustConfiguration, create_client};
///
/// let client = create_client(&TrustConfiguration::default()).expect("client");
/// assert!(client.context().security_downgrade().is_none());
/// ```
pub fn create_client(config: &TrustConfiguration) -> Result<HttpsClient, ClientConstructionError> {
    HttpClientFactory::new().create_client(config)
}
