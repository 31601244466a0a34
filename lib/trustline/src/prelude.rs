//! Prelude module for convenient imports.
//!
//! ```ignore
//! use trustline::prelude::*;
//! ```

pub use crate::{
    ClientConstructionError, ClientOptions, Error, HttpClientFactory, HttpsClient, RedirectPolicy,
    Request, Response, Result, StatusCode, TrustConfiguration, TrustError, create_client, header,
};
pub use serde::Deserialize;
