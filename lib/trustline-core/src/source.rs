//! Certificate and key sources.
//!
//! A configured value is either inline PEM text or a path to a file holding
//! PEM or raw DER material. The choice is made once, in
//! [`CertificateSource::parse`], and decoding is centralized here.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};

/// Armor prefix shared by every PEM section.
const PEM_ARMOR: &str = "-----BEGIN ";

/// Where certificate or key material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    /// PEM text given directly in the configuration.
    InlinePem(String),
    /// Path to a PEM or DER file.
    FilePath(PathBuf),
}

impl CertificateSource {
    /// Resolve a raw configuration value.
    ///
    /// Text carrying a PEM armor line is inline material, anything else is a
    /// filesystem path. Surrounding whitespace is ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains(PEM_ARMOR) {
            Self::InlinePem(raw.to_owned())
        } else {
            Self::FilePath(PathBuf::from(raw))
        }
    }

    /// Returns `true` for inline PEM text.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        matches!(self, Self::InlinePem(_))
    }

    /// Read the raw bytes. Files are read in one go and closed before
    /// returning, on success and on failure.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::InlinePem(pem) => Ok(pem.as_bytes().to_vec()),
            Self::FilePath(path) => fs::read(path),
        }
    }

    /// Read and decode every certificate of this source.
    ///
    /// PEM input may hold a bundle; DER input holds exactly one certificate.
    /// Each certificate must be well-formed X.509.
    pub(crate) fn certificates(&self) -> Result<Vec<CertificateDer<'static>>, String> {
        let bytes = self.read().map_err(|e| format!("cannot read: {e}"))?;
        decode_certificates(&bytes)
    }

    /// Read and decode a private key (PKCS#8, PKCS#1 or SEC1; PEM or DER).
    pub(crate) fn private_key(&self) -> Result<PrivateKeyDer<'static>, String> {
        let bytes = self.read().map_err(|e| format!("cannot read: {e}"))?;
        decode_private_key(&bytes)
    }
}

impl From<&str> for CertificateSource {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for CertificateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InlinePem(pem) => write!(f, "<inline PEM, {} bytes>", pem.len()),
            Self::FilePath(path) => write!(f, "{}", path.display()),
        }
    }
}

fn has_pem_armor(bytes: &[u8]) -> bool {
    bytes
        .windows(PEM_ARMOR.len())
        .any(|window| window == PEM_ARMOR.as_bytes())
}

fn decode_certificates(bytes: &[u8]) -> Result<Vec<CertificateDer<'static>>, String> {
    let certs = if has_pem_armor(bytes) {
        let mut reader = bytes;
        rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("malformed PEM: {e}"))?
    } else {
        vec![CertificateDer::from(bytes.to_vec())]
    };

    if certs.is_empty() {
        return Err("no certificate found".to_owned());
    }

    for cert in &certs {
        x509_parser::parse_x509_certificate(cert.as_ref())
            .map_err(|e| format!("invalid X.509 certificate: {e}"))?;
    }

    Ok(certs)
}

fn decode_private_key(bytes: &[u8]) -> Result<PrivateKeyDer<'static>, String> {
    if has_pem_armor(bytes) {
        let mut reader = bytes;
        rustls_pemfile::private_key(&mut reader)
            .map_err(|e| format!("malformed PEM: {e}"))?
            .ok_or_else(|| "no unencrypted private key found".to_owned())
    } else {
        PrivateKeyDer::try_from(bytes)
            .map(|key| key.clone_key())
            .map_err(|e| format!("unrecognized DER private key: {e}"))
    }
}

/// Subject distinguished name of a DER certificate, for diagnostics.
pub(crate) fn subject_of(cert: &CertificateDer<'_>) -> Option<String> {
    x509_parser::parse_x509_certificate(cert.as_ref())
        .ok()
        .map(|(_, parsed)| parsed.subject().to_string())
}
