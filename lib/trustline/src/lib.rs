//! HTTPS client factory with runtime-assembled trust.
//!
//! The trust of a client is described by a [`TrustConfiguration`]:
//! - `allow-self-signed`: skip server certificate chain validation
//! - `server-trusted-cert`: extra trusted certificates, on top of the
//!   Mozilla root program
//! - `client-cert` / `client-private-key`: identity for mutual TLS
//!
//! [`HttpClientFactory`] turns it into an [`HttpsClient`], a tower service
//! over hyper-util with rustls, redirect handling and optional logging.
//!
//! # Example
//!
//! ```ignore
//! use std::collections::HashMap;
//! use trustline::HttpClientFactory;
//!
//! let properties = HashMap::from([
//!     ("server-trusted-cert".to_string(), "/certs/ca.crt".to_string()),
//!     ("client-cert".to_string(), "/certs/client.crt".to_string()),
//!     ("client-private-key".to_string(), "/certs/client.pem".to_string()),
//! ]);
//!
//! let client = HttpClientFactory::new().create_client_from_properties(&properties)?;
//! let response = client.get("https://internal.example.com/service?id=1").await?;
//! let body: serde_json::Value = response.error_for_status()?.json()?;
//! ```

mod client;
mod config;
mod connector;
mod error;
mod factory;
pub mod middleware;
pub mod prelude;
mod response;

pub use client::{BoxedService, HttpsClient, HttpsClientBuilder, ServiceFuture};
pub use config::{ClientOptions, ClientOptionsBuilder, DEFAULT_MAX_REDIRECTS};
pub use connector::https_connector;
pub use error::{Error, Result};
pub use factory::{HttpClientFactory, create_client};
pub use response::Response;

// Re-export the trust layer
pub use trustline_core::{
    ALLOW_SELF_SIGNED, CLIENT_CERT, CLIENT_PRIVATE_KEY, CertificateSource, CertificateStore,
    ClientConstructionError, PROP_DELIM, RedirectPolicy, SERVER_TRUSTED_CERT, SecureClientContext,
    SecureContextBuilder, SecurityDowngrade, TrustConfiguration, TrustError, TrustManagerResolver,
};

// Re-export http crate types for requests, status codes and headers
pub use http::{Request, StatusCode, header};
