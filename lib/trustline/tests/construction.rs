//! Client construction failures: every bad input is reported before any
//! network activity, and names the offending option or file.

mod common;

use std::collections::HashMap;

use assert2::{check, let_assert};
use trustline::{
    CLIENT_CERT, CLIENT_PRIVATE_KEY, HttpClientFactory, SERVER_TRUSTED_CERT, TrustConfiguration,
    TrustError, create_client,
};

use common::{Pki, self_signed_server};

#[test]
fn missing_trusted_certificate_file_names_the_path() {
    let config = TrustConfiguration::default().trusted_certificate("/nonexistent/invalid.crt");

    let_assert!(Err(err) = create_client(&config));
    let_assert!(TrustError::CertificateLoad { input, .. } = err.trust_error());
    check!(input == "/nonexistent/invalid.crt");
    check!(err.to_string().contains("/nonexistent/invalid.crt"));
}

#[test]
fn garbage_trusted_certificate_is_rejected() {
    let pki = Pki::new();
    let path = pki.write("garbage.crt", b"this is not a certificate");

    let_assert!(Err(err) = create_client(&TrustConfiguration::default().trusted_certificate(path)));
    check!(err.trust_error().is_certificate_load());
}

#[test]
fn pem_without_certificate_is_rejected() {
    let pki = Pki::new();
    let key_only = pki.client().key_pem;

    let_assert!(
        Err(err) = create_client(&TrustConfiguration::default().trusted_certificate(key_only))
    );
    check!(err.trust_error().is_certificate_load());
}

#[test]
fn one_bad_entry_fails_the_whole_build() {
    let pki = Pki::new();
    let properties = HashMap::from([(
        SERVER_TRUSTED_CERT.to_owned(),
        format!("{},/nonexistent/second.crt", pki.write("ca.crt", &pki.ca.cert_pem)),
    )]);

    let_assert!(Err(err) = HttpClientFactory::new().create_client_from_properties(&properties));
    check!(err.to_string().contains("/nonexistent/second.crt"));
}

#[test]
fn blank_entries_are_ignored() {
    let pki = Pki::new();
    let properties = HashMap::from([
        (
            SERVER_TRUSTED_CERT.to_owned(),
            format!(" , {} ,", pki.write("ca.crt", &pki.ca.cert_pem)),
        ),
        (CLIENT_CERT.to_owned(), "  ".to_owned()),
        (CLIENT_PRIVATE_KEY.to_owned(), String::new()),
    ]);

    let client = HttpClientFactory::new()
        .create_client_from_properties(&properties)
        .expect("client");
    check!(!client.context().has_client_identity());
    check!(client.context().trusted_certificates() == 1);
}

#[test]
fn missing_client_key_file_is_identity_error() {
    let pki = Pki::new();
    let client_identity = pki.client();
    let config = TrustConfiguration::default().client_identity(
        pki.write("client.crt", &client_identity.cert_pem),
        "/nonexistent/client.pem",
    );

    let_assert!(Err(err) = create_client(&config));
    check!(err.trust_error().is_identity_load());
    check!(err.to_string().contains("/nonexistent/client.pem"));
}

#[test]
fn missing_client_certificate_file_is_identity_error() {
    let pki = Pki::new();
    let config = TrustConfiguration::default()
        .trusted_certificate(pki.write("ca.crt", &pki.ca.cert_pem))
        .client_identity(
            "/nonexistent/invalid.crt",
            pki.write("clientPrivateKey.pem", &pki.client().key_pem),
        );

    let_assert!(Err(err) = create_client(&config));
    check!(err.trust_error().is_identity_load());
    check!(err.to_string().contains("/nonexistent/invalid.crt"));
}

#[test]
fn garbage_client_certificate_is_identity_error() {
    let pki = Pki::new();
    let cert_path = pki.write("client.crt", b"not a certificate at all");
    let config = TrustConfiguration::default()
        .client_identity(cert_path.clone(), pki.client().key_pem);

    let_assert!(Err(err) = create_client(&config));
    let_assert!(TrustError::IdentityLoad { input, .. } = err.trust_error());
    check!(input == &cert_path);
}

#[test]
fn mismatched_client_key_is_rejected() {
    let pki = Pki::new();
    let client_identity = pki.client();
    let other_key = self_signed_server().key_pem;

    let config =
        TrustConfiguration::default().client_identity(client_identity.cert_pem, other_key);

    let_assert!(Err(err) = create_client(&config));
    check!(err.trust_error().is_identity_load());
}

#[test]
fn lone_private_key_is_rejected() {
    let pki = Pki::new();
    let properties = HashMap::from([(
        CLIENT_PRIVATE_KEY.to_owned(),
        pki.write("client.pem", &pki.client().key_pem),
    )]);

    let_assert!(Err(err) = HttpClientFactory::new().create_client_from_properties(&properties));
    let_assert!(
        TrustError::IncompleteIdentity {
            present: "client-private-key",
            missing: "client-cert",
        } = err.trust_error()
    );
}

#[test]
fn construction_needs_no_runtime() {
    let pki = Pki::new();
    let client_identity = pki.client();
    let config = TrustConfiguration::default()
        .trusted_certificate(pki.ca.cert_pem.clone())
        .client_identity(client_identity.cert_pem, client_identity.key_pem);

    let client = create_client(&config).expect("client");
    check!(client.context().has_client_identity());
    check!(client.context().need_client_auth());
}
