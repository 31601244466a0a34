//! Trust configuration and the option keys it is read from.

use std::collections::HashMap;
use std::hash::BuildHasher;

use serde::{Deserialize, Deserializer};

use crate::{CertificateSource, Result, TrustError};

/// Accept self-signed server certificates (`true`/`false`, default `false`).
pub const ALLOW_SELF_SIGNED: &str = "allow-self-signed";

/// Extra trusted server certificates, separated by [`PROP_DELIM`].
pub const SERVER_TRUSTED_CERT: &str = "server-trusted-cert";

/// Client certificate for mutual TLS (path or inline PEM).
pub const CLIENT_CERT: &str = "client-cert";

/// Client private key for mutual TLS (path or inline PEM).
pub const CLIENT_PRIVATE_KEY: &str = "client-private-key";

/// Separator of list-valued options.
pub const PROP_DELIM: char = ',';

/// Trust inputs for one client build.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use trustline_core::TrustConfiguration;
///
/// let properties = HashMap::from([
///     ("allow-self-signed".to_string(), "TRUE".to_string()),
///     ("server-trusted-cert".to_string(), "/certs/ca.crt, ,/certs/other.crt".to_string()),
/// ]);
/// let config = TrustConfiguration::from_properties(&properties);
///
/// assert!(config.allow_self_signed);
/// assert_eq!(config.trusted_server_certificates, ["/certs/ca.crt", "/certs/other.crt"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TrustConfiguration {
    /// Disable server certificate chain validation.
    pub allow_self_signed: bool,
    /// Extra trusted server certificates.
    #[serde(rename = "server-trusted-cert", deserialize_with = "certificate_list")]
    pub trusted_server_certificates: Vec<String>,
    /// Client certificate for mutual TLS.
    #[serde(rename = "client-cert")]
    pub client_certificate: Option<String>,
    /// Private key matching [`Self::client_certificate`].
    #[serde(rename = "client-private-key")]
    pub client_private_key: Option<String>,
}

impl TrustConfiguration {
    /// Read the recognized options from a property map.
    ///
    /// `allow-self-signed` is `true` only for a case-insensitive `true`.
    /// Blank list entries and blank values are ignored.
    #[must_use]
    pub fn from_properties<S: BuildHasher>(properties: &HashMap<String, String, S>) -> Self {
        let allow_self_signed = properties
            .get(ALLOW_SELF_SIGNED)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));

        let trusted_server_certificates = properties
            .get(SERVER_TRUSTED_CERT)
            .map(|value| split_list(value))
            .unwrap_or_default();

        Self {
            allow_self_signed,
            trusted_server_certificates,
            client_certificate: properties.get(CLIENT_CERT).and_then(|v| non_blank(v)),
            client_private_key: properties.get(CLIENT_PRIVATE_KEY).and_then(|v| non_blank(v)),
        }
    }

    /// Set whether self-signed server certificates are accepted.
    #[must_use]
    pub const fn allow_self_signed(mut self, allow: bool) -> Self {
        self.allow_self_signed = allow;
        self
    }

    /// Add a trusted server certificate (path or inline PEM).
    #[must_use]
    pub fn trusted_certificate(mut self, source: impl Into<String>) -> Self {
        self.trusted_server_certificates.push(source.into());
        self
    }

    /// Set the client certificate and private key for mutual TLS.
    #[must_use]
    pub fn client_identity(
        mut self,
        certificate: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        self.client_certificate = Some(certificate.into());
        self.client_private_key = Some(private_key.into());
        self
    }

    /// Non-blank trusted certificate sources, in order.
    pub fn trusted_sources(&self) -> impl Iterator<Item = CertificateSource> + '_ {
        self.trusted_server_certificates
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| CertificateSource::parse(entry))
    }

    /// Client certificate and key sources.
    ///
    /// Returns `None` when both are blank and
    /// [`TrustError::IncompleteIdentity`] when only one is set.
    pub fn identity_sources(&self) -> Result<Option<(CertificateSource, CertificateSource)>> {
        let certificate = self.client_certificate.as_deref().and_then(non_blank);
        let private_key = self.client_private_key.as_deref().and_then(non_blank);

        match (certificate, private_key) {
            (Some(certificate), Some(private_key)) => Ok(Some((
                CertificateSource::parse(&certificate),
                CertificateSource::parse(&private_key),
            ))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(TrustError::IncompleteIdentity {
                present: CLIENT_CERT,
                missing: CLIENT_PRIVATE_KEY,
            }),
            (None, Some(_)) => Err(TrustError::IncompleteIdentity {
                present: CLIENT_PRIVATE_KEY,
                missing: CLIENT_CERT,
            }),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn split_list(value: &str) -> Vec<String> {
    value.split(PROP_DELIM).filter_map(non_blank).collect()
}

fn certificate_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entries {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Entries::deserialize(deserializer)? {
        Entries::Joined(value) => split_list(&value),
        Entries::List(values) => values.iter().filter_map(|v| non_blank(v)).collect(),
    })
}
