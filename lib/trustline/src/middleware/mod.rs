//! Tower middleware layers for the HTTPS client.
//!
//! Layers wrap the raw hyper service and see every request as an
//! `http::Request<Bytes>` and every response as a buffered [`crate::Response`].
//!
//! - [`FollowRedirectLayer`] - follows redirects according to a
//!   [`trustline_core::RedirectPolicy`]
//! - [`LoggingLayer`] - logs requests and responses using `tracing`
//!
//! Custom layers can be added with [`crate::HttpsClientBuilder::layer`].

mod follow_redirect;
mod logging;

pub use follow_redirect::{FollowRedirect, FollowRedirectLayer};
pub use logging::{LogLevel, Logging, LoggingLayer};
