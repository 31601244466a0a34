//! HTTPS connector built from a [`SecureClientContext`].

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use trustline_core::SecureClientContext;

use crate::ClientOptions;

/// Create an HTTPS connector using the context's TLS configuration.
///
/// Supports HTTP/1.1 and HTTP/2 (negotiated through ALPN). Plain `http`
/// URLs are allowed; whether a redirect may lead there is decided by the
/// context's [`trustline_core::RedirectPolicy`].
#[must_use]
pub fn https_connector(
    context: &SecureClientContext,
    options: &ClientOptions,
) -> HttpsConnector<HttpConnector> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(options.connect_timeout));

    HttpsConnectorBuilder::new()
        .with_tls_config(context.tls_config().as_ref().clone())
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}
